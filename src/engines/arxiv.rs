//! arXiv engine: Atom API client.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;

use crate::config::EngineConfig;
use crate::engines::{Engine, EngineError};
use crate::models::{ResultBuilder, SearchQuery, SearchResult};
use crate::utils::Fetcher;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// arXiv holds preprints; results carry an arXiv id and a direct PDF URL.
#[derive(Debug)]
pub struct ArxivEngine {
    fetcher: Fetcher,
}

impl ArxivEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
        })
    }

    /// Build the arXiv query expression with year bounds as submitted-date
    /// ranges.
    fn build_search_expr(query: &SearchQuery) -> String {
        let mut parts = Vec::new();

        if !query.query.is_empty() {
            parts.push(format!("all:{}", query.query));
        }

        match (query.year_from, query.year_to) {
            (Some(from), Some(to)) => {
                parts.push(format!("submitted_date:[{}0101 TO {}1231]", from, to));
            }
            (Some(from), None) => {
                parts.push(format!("submitted_date:[{}0101 TO *]", from));
            }
            (None, Some(to)) => {
                parts.push(format!("submitted_date:[* TO {}1231]", to));
            }
            (None, None) => {}
        }

        if parts.is_empty() {
            "all:*".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    /// Map one Atom entry to a result; `None` drops entries with no usable
    /// id or title.
    fn parse_entry(entry: &feed_rs::model::Entry, include_abstract: bool) -> Option<SearchResult> {
        let arxiv_id = entry
            .id
            .split("/abs/")
            .last()
            .map(|s| s.split('v').next().unwrap_or(s).to_string())
            .filter(|s| !s.is_empty())?;

        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())?;

        let authors = entry
            .authors
            .iter()
            .map(|a| a.name.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let mut builder = ResultBuilder::new(title, "arxiv")
            .authors(authors)
            .arxiv_id(arxiv_id.clone())
            .url(entry.id.clone())
            .pdf_url(format!("{}/{}.pdf", ARXIV_PDF_URL, arxiv_id));

        if let Some(published) = entry.published {
            builder = builder.year(published.year());
        }

        if include_abstract {
            if let Some(summary) = &entry.summary {
                let text = summary.content.trim();
                if !text.is_empty() {
                    builder = builder.abstract_text(text);
                }
            }
        }

        Some(builder.build())
    }
}

#[async_trait]
impl Engine for ArxivEngine {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn base_url(&self) -> &str {
        ARXIV_API_URL
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError> {
        let expr = Self::build_search_expr(query);
        let max_results = match query.max_results {
            0 => 200, // arXiv caps one page at 200
            n => n.min(200),
        };

        let response = self
            .fetcher
            .get(
                ARXIV_API_URL,
                &[
                    ("search_query", expr),
                    ("max_results", max_results.to_string()),
                    ("sortBy", "relevance".to_string()),
                    ("sortOrder", "descending".to_string()),
                ],
            )
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Network(format!("failed to read response: {}", e)))?;

        let feed = parser::parse(bytes.as_ref())
            .map_err(|e| EngineError::Parse(format!("Atom feed: {}", e)))?;

        let results = feed
            .entries
            .iter()
            .filter_map(|entry| {
                let parsed = Self::parse_entry(entry, query.include_abstract);
                if parsed.is_none() {
                    tracing::debug!(entry_id = %entry.id, "skipping entry without id/title");
                }
                parsed
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <title>arXiv Query Results</title>
            <entry>
                <id>http://arxiv.org/abs/2301.12345v2</id>
                <title>Test Paper Title</title>
                <summary>An abstract about things.</summary>
                <published>2023-01-15T10:00:00Z</published>
                <author><name>Ada Lovelace</name></author>
                <author><name>Alan Turing</name></author>
            </entry>
            <entry>
                <id>http://arxiv.org/abs/</id>
                <title>Entry With Broken Id</title>
            </entry>
        </feed>"#;

    #[test]
    fn test_build_search_expr() {
        let query = SearchQuery::new("quantum error correction")
            .year_from(2019)
            .year_to(2021);
        let expr = ArxivEngine::build_search_expr(&query);
        assert!(expr.contains("all:quantum error correction"));
        assert!(expr.contains("submitted_date:[20190101 TO 20211231]"));
    }

    #[test]
    fn test_build_search_expr_open_bounds() {
        let expr = ArxivEngine::build_search_expr(&SearchQuery::new("x").year_from(2020));
        assert!(expr.contains("[20200101 TO *]"));

        let expr = ArxivEngine::build_search_expr(&SearchQuery::new(""));
        assert_eq!(expr, "all:*");
    }

    #[test]
    fn test_parse_feed_entries() {
        let feed = parser::parse(FEED.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 2);

        let result = ArxivEngine::parse_entry(&feed.entries[0], true).unwrap();
        assert_eq!(result.title, "Test Paper Title");
        assert_eq!(result.arxiv_id.as_deref(), Some("2301.12345"));
        assert_eq!(result.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(result.year, Some(2023));
        assert_eq!(
            result.pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/2301.12345.pdf")
        );
        assert!(result.abstract_text.is_some());

        // Broken id entry is dropped, not an error
        assert!(ArxivEngine::parse_entry(&feed.entries[1], true).is_none());
    }

    #[test]
    fn test_abstract_omitted_when_not_requested() {
        let feed = parser::parse(FEED.as_bytes()).unwrap();
        let result = ArxivEngine::parse_entry(&feed.entries[0], false).unwrap();
        assert!(result.abstract_text.is_none());
    }
}
