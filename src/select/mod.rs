//! Multi-strategy element selection for HTML scraping engines.
//!
//! Portal markup drifts constantly; instead of one brittle selector per
//! field, each logical field carries an ordered list of candidate strategies
//! (CSS or XPath), tried highest-priority-first. The first strategy that
//! yields a non-empty match wins and is recorded so that markup drift shows
//! up in diagnostics before the primary selectors break entirely.

use scraper::{ElementRef, Selector};
use std::collections::HashMap;
use std::sync::Mutex;

mod xpath;

pub use xpath::xpath_to_css;

/// Selector language of one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Css,
    XPath,
}

/// One candidate rule for locating a value inside an HTML document
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    pub selector: String,
    pub kind: SelectorKind,
    pub priority: i32,
    pub description: String,
}

impl SelectorStrategy {
    pub fn css(selector: impl Into<String>, priority: i32, description: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: SelectorKind::Css,
            priority,
            description: description.into(),
        }
    }

    pub fn xpath(
        selector: impl Into<String>,
        priority: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            kind: SelectorKind::XPath,
            priority,
            description: description.into(),
        }
    }

    /// Compile into a scraper CSS selector. XPath strategies are translated
    /// through the supported subset; anything untranslatable is a miss, not
    /// an error.
    fn compile(&self) -> Option<Selector> {
        let css = match self.kind {
            SelectorKind::Css => self.selector.clone(),
            SelectorKind::XPath => match xpath_to_css(&self.selector) {
                Some(css) => css,
                None => {
                    tracing::debug!(xpath = %self.selector, "xpath outside supported subset");
                    return None;
                }
            },
        };

        // parse errors borrow the selector string, so drop them before
        // returning
        let parsed = Selector::parse(&css).ok();
        if parsed.is_none() {
            tracing::debug!(selector = %css, "invalid selector, skipping strategy");
        }
        parsed
    }
}

/// Ordered strategies for one logical field (e.g. "title")
#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub field: String,
    pub required: bool,
    strategies: Vec<SelectorStrategy>,
}

impl FieldSelector {
    pub fn new(field: impl Into<String>, required: bool) -> Self {
        Self {
            field: field.into(),
            required,
            strategies: Vec::new(),
        }
    }

    /// Add a strategy; the list is kept sorted by descending priority
    pub fn strategy(mut self, strategy: SelectorStrategy) -> Self {
        self.strategies.push(strategy);
        self.strategies.sort_by(|a, b| b.priority.cmp(&a.priority));
        self
    }

    /// Strategies in evaluation order (highest priority first)
    pub fn strategies(&self) -> &[SelectorStrategy] {
        &self.strategies
    }
}

/// Resolves logical fields to DOM nodes and records which strategy worked.
#[derive(Debug, Default)]
pub struct SelectorEngine {
    hits: Mutex<HashMap<String, String>>,
}

impl SelectorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// First matching node for the field, or `None`.
    ///
    /// "No match" is an expected, common outcome: a required miss is logged
    /// at warning level but never raised, since a partial record beats losing
    /// the whole page.
    pub fn find_element<'a>(
        &self,
        field: &FieldSelector,
        context: ElementRef<'a>,
    ) -> Option<ElementRef<'a>> {
        self.find_elements(field, context).into_iter().next()
    }

    /// All matches from the first strategy that yields any.
    pub fn find_elements<'a>(
        &self,
        field: &FieldSelector,
        context: ElementRef<'a>,
    ) -> Vec<ElementRef<'a>> {
        for strategy in field.strategies() {
            let Some(selector) = strategy.compile() else {
                continue;
            };

            let matches: Vec<ElementRef<'a>> = context.select(&selector).collect();
            if !matches.is_empty() {
                self.record_hit(&field.field, &strategy.description);
                return matches;
            }
        }

        if field.required {
            tracing::warn!(field = %field.field, "no selector strategy matched required field");
        }
        Vec::new()
    }

    /// Trimmed text content of the field's first match.
    pub fn find_text(&self, field: &FieldSelector, context: ElementRef<'_>) -> Option<String> {
        self.find_element(field, context).map(|el| element_text(&el))
    }

    /// Which strategy last succeeded for a field, for drift diagnostics.
    pub fn winning_strategy(&self, field: &str) -> Option<String> {
        self.hits.lock().ok()?.get(field).cloned()
    }

    fn record_hit(&self, field: &str, description: &str) {
        if let Ok(mut hits) = self.hits.lock() {
            hits.insert(field.to_string(), description.to_string());
        }
    }
}

/// Whitespace-normalized text content of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const FIXTURE: &str = r#"
        <html><body>
            <div class="paper">
                <span class="headline">Resilient Scraping</span>
                <a href="/p/1" class="dl">PDF</a>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_fallback_ordering() {
        // Only the priority-50 strategy matches; 100 must be tried and fail
        // first, and 10 (which would also match) must never be reached.
        let field = FieldSelector::new("title", true)
            .strategy(SelectorStrategy::css("h1.title", 100, "primary heading"))
            .strategy(SelectorStrategy::css("span.headline", 50, "headline span"))
            .strategy(SelectorStrategy::css("div.paper span", 10, "any span"));

        let doc = Html::parse_document(FIXTURE);
        let engine = SelectorEngine::new();
        let element = engine.find_element(&field, doc.root_element()).unwrap();

        assert_eq!(element_text(&element), "Resilient Scraping");
        assert_eq!(
            engine.winning_strategy("title").as_deref(),
            Some("headline span")
        );
    }

    #[test]
    fn test_xpath_strategy_matches() {
        let field = FieldSelector::new("pdf", false).strategy(SelectorStrategy::xpath(
            "//a[@class='dl']",
            100,
            "download link",
        ));

        let doc = Html::parse_document(FIXTURE);
        let engine = SelectorEngine::new();
        let element = engine.find_element(&field, doc.root_element()).unwrap();
        assert_eq!(element.value().attr("href"), Some("/p/1"));
    }

    #[test]
    fn test_required_miss_returns_none() {
        let field = FieldSelector::new("abstract", true)
            .strategy(SelectorStrategy::css("div.abstract", 100, "abstract div"));

        let doc = Html::parse_document(FIXTURE);
        let engine = SelectorEngine::new();
        assert!(engine.find_element(&field, doc.root_element()).is_none());
        assert!(engine.winning_strategy("abstract").is_none());
    }

    #[test]
    fn test_unsupported_xpath_falls_through() {
        let field = FieldSelector::new("title", false)
            .strategy(SelectorStrategy::xpath(
                "//span[contains(text(),'x')]",
                100,
                "text predicate",
            ))
            .strategy(SelectorStrategy::css("span.headline", 50, "headline span"));

        let doc = Html::parse_document(FIXTURE);
        let engine = SelectorEngine::new();
        let element = engine.find_element(&field, doc.root_element()).unwrap();
        assert_eq!(element_text(&element), "Resilient Scraping");
        assert_eq!(
            engine.winning_strategy("title").as_deref(),
            Some("headline span")
        );
    }

    #[test]
    fn test_invalid_css_strategy_falls_through() {
        let field = FieldSelector::new("title", false)
            .strategy(SelectorStrategy::css("div..broken[", 100, "malformed"))
            .strategy(SelectorStrategy::css("span.headline", 50, "headline span"));

        let doc = Html::parse_document(FIXTURE);
        let engine = SelectorEngine::new();
        let element = engine.find_element(&field, doc.root_element()).unwrap();
        assert_eq!(element_text(&element), "Resilient Scraping");
    }

    #[test]
    fn test_find_elements_returns_all_from_winning_strategy() {
        let html = r#"<ul><li class="a">1</li><li class="a">2</li><li class="b">3</li></ul>"#;
        let field = FieldSelector::new("rows", false)
            .strategy(SelectorStrategy::css("li.missing", 100, "missing"))
            .strategy(SelectorStrategy::css("li.a", 50, "list items"));

        let doc = Html::parse_document(html);
        let engine = SelectorEngine::new();
        let elements = engine.find_elements(&field, doc.root_element());
        assert_eq!(elements.len(), 2);
    }
}
