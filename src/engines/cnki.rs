//! CNKI engine: Chinese academic portal scraping.
//!
//! CNKI serves legacy server-rendered HTML whose charset headers lie often
//! enough that responses are taken as raw bytes and pushed through the
//! [`EncodingResolver`] before parsing. Result rows carry the
//! `DbCode`/`DbName`/`FileName` triple in their detail-link query strings;
//! that triple is what later download resolution needs, so it rides along as
//! [`EngineMeta::Cnki`].

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use url::Url;

use crate::config::EngineConfig;
use crate::encoding::EncodingResolver;
use crate::engines::{Engine, EngineError};
use crate::models::{EngineMeta, ResultBuilder, SearchQuery, SearchResult};
use crate::select::{element_text, FieldSelector, SelectorEngine, SelectorStrategy};
use crate::utils::Fetcher;

const CNKI_BASE: &str = "https://kns.cnki.net";
const CNKI_SEARCH_PATH: &str = "/kns8/brief/grid";

#[derive(Debug)]
pub struct CnkiEngine {
    fetcher: Fetcher,
    resolver: EncodingResolver,
    selectors: SelectorEngine,
    fields: CnkiFields,
}

#[derive(Debug)]
struct CnkiFields {
    row: FieldSelector,
    title: FieldSelector,
    authors: FieldSelector,
    source: FieldSelector,
    date: FieldSelector,
}

impl CnkiFields {
    fn new() -> Self {
        Self {
            row: FieldSelector::new("row", true)
                .strategy(SelectorStrategy::css(
                    "table.result-table-list tbody tr",
                    100,
                    "grid result row",
                ))
                .strategy(SelectorStrategy::xpath(
                    "//table[@class='GridTableContent']/tbody/tr",
                    50,
                    "legacy grid row",
                )),
            title: FieldSelector::new("title", true)
                .strategy(SelectorStrategy::css("td.name a.fz14", 100, "title link"))
                .strategy(SelectorStrategy::css("td.name a", 80, "any name-cell link"))
                .strategy(SelectorStrategy::xpath(
                    "//a[@class='fz14']",
                    40,
                    "legacy title link",
                )),
            authors: FieldSelector::new("authors", false)
                .strategy(SelectorStrategy::css("td.author a", 100, "author links"))
                .strategy(SelectorStrategy::css("td.author", 50, "author cell text")),
            source: FieldSelector::new("source", false)
                .strategy(SelectorStrategy::css("td.source a", 100, "journal link"))
                .strategy(SelectorStrategy::css("td.source", 50, "journal cell text")),
            date: FieldSelector::new("date", false)
                .strategy(SelectorStrategy::css("td.date", 100, "publish date cell")),
        }
    }
}

impl CnkiEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            resolver: EncodingResolver::new(),
            selectors: SelectorEngine::new(),
            fields: CnkiFields::new(),
        })
    }

    /// Search against an explicit base URL. Tests point this at a local
    /// server; [`Engine::search`] passes the production base.
    pub async fn search_at(
        &self,
        base: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, EngineError> {
        let page_size = match query.max_results {
            0 => 50,
            n => n.min(50),
        };

        let mut form = vec![
            ("QueryJson", build_query_json(query)),
            ("PageName", "defaultresult".to_string()),
            ("DBCode", "SCDB".to_string()),
            ("CurPage", "1".to_string()),
            ("RecordsCntPerPage", page_size.to_string()),
        ];
        if let Some(from) = query.year_from {
            form.push(("YearFrom", from.to_string()));
        }
        if let Some(to) = query.year_to {
            form.push(("YearTo", to.to_string()));
        }

        let url = format!("{}{}", base, CNKI_SEARCH_PATH);
        let response = self.fetcher.post_form(&url, &form).await?;

        let declared = charset_from_content_type(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Network(format!("failed to read response: {}", e)))?;
        let html = self.resolver.resolve(&bytes, declared.as_deref());

        Ok(self.parse_page(&html, query))
    }

    pub(crate) fn parse_page(&self, html: &str, query: &SearchQuery) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        let mut results = Vec::new();

        for row in self.selectors.find_elements(&self.fields.row, root) {
            match self.parse_row(row, query) {
                Some(result) => results.push(result),
                None => {
                    tracing::debug!("skipping cnki row without title link");
                }
            }
            if query.max_results > 0 && results.len() >= query.max_results {
                break;
            }
        }

        results
    }

    fn parse_row(&self, row: ElementRef<'_>, query: &SearchQuery) -> Option<SearchResult> {
        let title_el = self.selectors.find_element(&self.fields.title, row)?;
        let title = element_text(&title_el);
        if title.is_empty() {
            return None;
        }

        let mut builder = ResultBuilder::new(title, "cnki");

        if let Some(href) = title_el.value().attr("href") {
            if let Some(url) = absolutize(href) {
                builder = builder.url(url.as_str());
                if let Some(meta) = doc_meta_from_url(&url) {
                    builder = builder.metadata(meta);
                }
            }
        }

        let authors: Vec<String> = self
            .selectors
            .find_elements(&self.fields.authors, row)
            .iter()
            .map(element_text)
            .filter(|a| !a.is_empty())
            .collect();
        builder = builder.authors(authors);

        if let Some(source) = self.selectors.find_text(&self.fields.source, row) {
            if !source.is_empty() {
                builder = builder.journal(source);
            }
        }

        if let Some(date) = self.selectors.find_text(&self.fields.date, row) {
            if let Some(year) = parse_year(&date) {
                if !query.year_in_range(year) {
                    return None;
                }
                builder = builder.year(year);
            }
        }

        Some(builder.build())
    }
}

/// CNKI's grid endpoint takes its search expression as a JSON blob inside
/// one form field.
fn build_query_json(query: &SearchQuery) -> String {
    serde_json::json!({
        "Platform": "",
        "DBCode": "SCDB",
        "KuaKuCode": "CJFQ,CDMD,CIPD,CCND",
        "QNode": {
            "QGroup": [{
                "Key": "Subject",
                "Title": "",
                "Logic": 1,
                "Items": [{
                    "Title": "主题",
                    "Name": "SU",
                    "Value": query.query,
                    "Operate": "%=",
                }],
            }],
        },
    })
    .to_string()
}

/// Pull `DbCode`, `DbName`, and `FileName` out of a detail-link query string.
/// All three are required for later download resolution; a link missing any
/// of them yields no metadata.
fn doc_meta_from_url(url: &Url) -> Option<EngineMeta> {
    let mut db_code = None;
    let mut db_name = None;
    let mut file_name = None;

    for (key, value) in url.query_pairs() {
        match key.to_ascii_lowercase().as_str() {
            "dbcode" => db_code = Some(value.into_owned()),
            "dbname" => db_name = Some(value.into_owned()),
            "filename" => file_name = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(EngineMeta::Cnki {
        db_code: db_code?,
        db_name: db_name?,
        file_name: file_name?,
    })
}

/// Resolve a possibly-relative detail link against the CNKI host.
fn absolutize(href: &str) -> Option<Url> {
    Url::parse(href)
        .or_else(|_| Url::parse(CNKI_BASE).and_then(|base| base.join(href)))
        .ok()
}

/// Dates come back as "2024-01-15" or "2024年01期"; only the year matters.
fn parse_year(date: &str) -> Option<i32> {
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

fn charset_from_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| {
            ct.split(';')
                .map(str::trim)
                .find_map(|part| part.strip_prefix("charset="))
                .map(|cs| cs.trim_matches('"').to_string())
        })
}

#[async_trait]
impl Engine for CnkiEngine {
    fn name(&self) -> &str {
        "cnki"
    }

    fn base_url(&self) -> &str {
        CNKI_BASE
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError> {
        self.search_at(CNKI_BASE, query).await
    }
}
