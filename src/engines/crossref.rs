//! Crossref engine: REST/JSON API client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::engines::{Engine, EngineError};
use crate::models::{ResultBuilder, SearchQuery, SearchResult};
use crate::utils::Fetcher;

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// Crossref REST API client. The polite pool expects a contact address in
/// the user agent.
#[derive(Debug)]
pub struct CrossrefEngine {
    fetcher: Fetcher,
}

impl CrossrefEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
        })
    }

    fn parse_item(item: CrItem, include_abstract: bool) -> Option<SearchResult> {
        let title = item
            .title
            .as_ref()
            .and_then(|t| t.first())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())?;

        let authors: Vec<String> = item
            .author
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| match (a.given, a.family) {
                (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
                (None, Some(family)) => Some(family),
                (Some(given), None) => Some(given),
                (None, None) => None,
            })
            .collect();

        let mut builder = ResultBuilder::new(title, "crossref").authors(authors);

        if let Some(doi) = item.doi.filter(|d| !d.is_empty()) {
            builder = builder.doi(doi);
        }
        if let Some(url) = item.url.filter(|u| !u.is_empty()) {
            builder = builder.url(url);
        }
        if let Some(year) = item
            .issued
            .as_ref()
            .and_then(CrDate::year)
            .or_else(|| item.published_print.as_ref().and_then(CrDate::year))
        {
            builder = builder.year(year);
        }
        if let Some(journal) = item
            .container_title
            .as_ref()
            .and_then(|c| c.first())
            .filter(|j| !j.is_empty())
        {
            builder = builder.journal(journal.clone());
        }
        if let Some(volume) = item.volume.filter(|v| !v.is_empty()) {
            builder = builder.volume(volume);
        }
        if let Some(issue) = item.issue.filter(|i| !i.is_empty()) {
            builder = builder.issue(issue);
        }
        if let Some(pages) = item.page.filter(|p| !p.is_empty()) {
            builder = builder.pages(pages);
        }
        if let Some(citations) = item.is_referenced_by_count {
            builder = builder.citations(citations);
        }
        if include_abstract {
            if let Some(text) = item.r#abstract.filter(|a| !a.is_empty()) {
                builder = builder.abstract_text(strip_jats(&text));
            }
        }

        Some(builder.build())
    }
}

/// Crossref abstracts arrive as JATS XML; keep just the text.
fn strip_jats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Engine for CrossrefEngine {
    fn name(&self) -> &str {
        "crossref"
    }

    fn base_url(&self) -> &str {
        CROSSREF_API_BASE
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError> {
        let url = format!("{}/works", CROSSREF_API_BASE);
        self.search_at(&url, query).await
    }
}

impl CrossrefEngine {
    /// Search against an explicit endpoint (tests point this at a mock).
    pub async fn search_at(
        &self,
        url: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, EngineError> {
        let rows = match query.max_results {
            0 => 100,
            n => n.min(100),
        };

        let mut params = vec![
            ("query", query.query.clone()),
            ("rows", rows.to_string()),
        ];

        let mut filters = Vec::new();
        if let Some(from) = query.year_from {
            filters.push(format!("from-pub-date:{}-01-01", from));
        }
        if let Some(to) = query.year_to {
            filters.push(format!("until-pub-date:{}-12-31", to));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        let response = self.fetcher.get(url, &params).await?;

        let data: CrResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(format!("JSON: {}", e)))?;

        let results = data
            .message
            .items
            .into_iter()
            .filter_map(|item| Self::parse_item(item, query.include_abstract))
            .collect();

        Ok(results)
    }
}

// ===== Crossref API types =====

#[derive(Debug, Deserialize)]
struct CrResponse {
    message: CrMessage,
}

#[derive(Debug, Deserialize)]
struct CrMessage {
    #[serde(default)]
    items: Vec<CrItem>,
}

#[derive(Debug, Deserialize)]
struct CrItem {
    title: Option<Vec<String>>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    author: Option<Vec<CrAuthor>>,
    issued: Option<CrDate>,
    #[serde(rename = "published-print")]
    published_print: Option<CrDate>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    #[serde(rename = "is-referenced-by-count")]
    is_referenced_by_count: Option<u32>,
    r#abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrDate {
    #[serde(rename = "date-parts")]
    date_parts: Option<Vec<Vec<Option<i32>>>>,
}

impl CrDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.as_ref()?.first()?.first().copied().flatten()
    }
}
