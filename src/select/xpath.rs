//! Conservative XPath → CSS translation.
//!
//! Selector tables keep XPath fallbacks copied from browser devtools; the
//! subset they actually use is small: descendant/child steps over element
//! names, `[@attr='value']` predicates, `[@attr]` existence tests, `*`, and
//! positional `[n]` predicates. Everything else translates to `None`, which
//! callers treat as a strategy miss.

/// Translate an XPath expression to CSS, or `None` if it uses anything
/// outside the supported subset.
pub fn xpath_to_css(xpath: &str) -> Option<String> {
    let xpath = xpath.trim();
    if xpath.is_empty() {
        return None;
    }

    // Leading "//" is a descendant axis from anywhere; a single "/" anchors
    // at the root, which CSS cannot express exactly, so treat both as
    // descendant selectors.
    let rest = xpath
        .strip_prefix("//")
        .or_else(|| xpath.strip_prefix('/'))?;

    let mut css = String::new();
    // Split on '/', keeping track of empty segments produced by '//'
    let mut descendant = true;
    for segment in rest.split('/') {
        if segment.is_empty() {
            // came from "//": next step is a descendant step
            descendant = true;
            continue;
        }

        let step = translate_step(segment)?;
        if !css.is_empty() {
            css.push_str(if descendant { " " } else { " > " });
        }
        css.push_str(&step);
        descendant = false;
    }

    if css.is_empty() {
        None
    } else {
        Some(css)
    }
}

/// Translate one step, e.g. `div[@class='result'][2]` → `div[class='result']:nth-of-type(2)`.
fn translate_step(step: &str) -> Option<String> {
    let (name, predicates) = match step.find('[') {
        Some(pos) => (&step[..pos], &step[pos..]),
        None => (step, ""),
    };

    // Axes, attribute selections and functions are out of scope
    if name.contains("::") || name.contains('(') || name.starts_with('@') {
        return None;
    }

    let mut css = if name == "*" {
        "*".to_string()
    } else if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') && !name.is_empty() {
        name.to_string()
    } else {
        return None;
    };

    let mut rest = predicates;
    while !rest.is_empty() {
        let inner_end = rest.find(']')?;
        let inner = &rest[1..inner_end];
        css.push_str(&translate_predicate(inner)?);
        rest = &rest[inner_end + 1..];
    }

    Some(css)
}

fn translate_predicate(predicate: &str) -> Option<String> {
    let predicate = predicate.trim();

    // Positional predicate: [3] → :nth-of-type(3)
    if let Ok(n) = predicate.parse::<usize>() {
        return Some(format!(":nth-of-type({})", n));
    }

    let attr = predicate.strip_prefix('@')?;

    // Existence test: [@href] → [href]
    if !attr.contains('=') {
        return if is_attr_name(attr) {
            Some(format!("[{}]", attr))
        } else {
            None
        };
    }

    // Equality test: [@class='x'] → [class='x']
    let (name, value) = attr.split_once('=')?;
    let name = name.trim();
    let value = value.trim();
    if !is_attr_name(name) {
        return None;
    }

    let unquoted = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))?;

    Some(format!("[{}='{}']", name, unquoted))
}

fn is_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_descendant() {
        assert_eq!(xpath_to_css("//div"), Some("div".to_string()));
        assert_eq!(xpath_to_css("//div//a"), Some("div a".to_string()));
    }

    #[test]
    fn test_child_steps() {
        assert_eq!(
            xpath_to_css("//table/tbody/tr"),
            Some("table > tbody > tr".to_string())
        );
    }

    #[test]
    fn test_attribute_equality() {
        assert_eq!(
            xpath_to_css("//div[@class='result-item']/a"),
            Some("div[class='result-item'] > a".to_string())
        );
        assert_eq!(
            xpath_to_css(r#"//a[@target="_blank"]"#),
            Some(r#"a[target='_blank']"#.to_string())
        );
    }

    #[test]
    fn test_attribute_existence_and_position() {
        assert_eq!(xpath_to_css("//a[@href]"), Some("a[href]".to_string()));
        assert_eq!(
            xpath_to_css("//tr[2]/td[1]"),
            Some("tr:nth-of-type(2) > td:nth-of-type(1)".to_string())
        );
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(
            xpath_to_css("//*[@id='content']"),
            Some("*[id='content']".to_string())
        );
    }

    #[test]
    fn test_unsupported_forms_rejected() {
        assert!(xpath_to_css("//span[contains(text(),'x')]").is_none());
        assert!(xpath_to_css("//div/following-sibling::p").is_none());
        assert!(xpath_to_css("//a/@href").is_none());
        assert!(xpath_to_css("..").is_none());
        assert!(xpath_to_css("").is_none());
    }
}
