//! Google Scholar engine: adversarial HTML scraping.
//!
//! Scholar has no API, rate-limits aggressively, and serves soft blocks
//! (CAPTCHA interstitials) with a 200 status; those are detected by body
//! markers and surfaced as a permanent [`EngineError::Blocked`]. Markup
//! drifts often enough that every field carries selector fallbacks.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engines::{Engine, EngineError};
use crate::models::{ResultBuilder, SearchQuery, SearchResult};
use crate::select::{element_text, FieldSelector, SelectorEngine, SelectorStrategy};
use crate::utils::{Fetcher, HttpClient};

const SCHOLAR_URL: &str = "https://scholar.google.com/scholar";

const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0 Safari/537.36";

/// Body markers Scholar serves with a 200 status when it has decided we are
/// a bot.
const BLOCK_MARKERS: [&str; 3] = [
    "Our systems have detected unusual traffic",
    "id=\"gs_captcha_f\"",
    "/sorry/index",
];

#[derive(Debug)]
pub struct GoogleScholarEngine {
    fetcher: Fetcher,
    selectors: SelectorEngine,
    fields: ScholarFields,
}

/// Selector tables, compiled once at engine construction.
#[derive(Debug)]
struct ScholarFields {
    result_block: FieldSelector,
    title: FieldSelector,
    byline: FieldSelector,
    snippet: FieldSelector,
    pdf_link: FieldSelector,
    footer_links: FieldSelector,
}

impl ScholarFields {
    fn new() -> Self {
        Self {
            result_block: FieldSelector::new("result_block", true)
                .strategy(SelectorStrategy::css(
                    "div.gs_r.gs_or.gs_scl",
                    100,
                    "full result block",
                ))
                .strategy(SelectorStrategy::css("div.gs_ri", 50, "inner result body"))
                .strategy(SelectorStrategy::xpath(
                    "//div[@class='gs_r']",
                    10,
                    "legacy result div",
                )),
            title: FieldSelector::new("title", true)
                .strategy(SelectorStrategy::css("h3.gs_rt a", 100, "title link"))
                .strategy(SelectorStrategy::css("h3.gs_rt", 50, "title heading")),
            byline: FieldSelector::new("byline", false)
                .strategy(SelectorStrategy::css("div.gs_a", 100, "author/venue byline")),
            snippet: FieldSelector::new("snippet", false)
                .strategy(SelectorStrategy::css("div.gs_rs", 100, "abstract snippet")),
            pdf_link: FieldSelector::new("pdf_link", false)
                .strategy(SelectorStrategy::css(
                    "div.gs_or_ggsm a",
                    100,
                    "sidebar pdf link",
                ))
                .strategy(SelectorStrategy::css(
                    "div.gs_ggsd a",
                    50,
                    "legacy pdf link",
                )),
            footer_links: FieldSelector::new("footer_links", false)
                .strategy(SelectorStrategy::css("div.gs_fl a", 100, "footer links")),
        }
    }
}

impl GoogleScholarEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        // Scholar rejects non-browser user agents outright
        let http = HttpClient::builder(Duration::from_secs(config.timeout_secs))
            .user_agent(BROWSER_UA)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            fetcher: Fetcher::with_client(http, config),
            selectors: SelectorEngine::new(),
            fields: ScholarFields::new(),
        })
    }

    /// Parse a results page. Public within the crate for fixture tests.
    pub(crate) fn parse_page(&self, html: &str, query: &SearchQuery) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        let mut results = Vec::new();

        for block in self.selectors.find_elements(&self.fields.result_block, root) {
            match self.parse_block(block, query.include_abstract) {
                Some(result) => results.push(result),
                None => {
                    tracing::debug!("skipping scholar result block without title");
                }
            }
            if query.max_results > 0 && results.len() >= query.max_results {
                break;
            }
        }

        results
    }

    fn parse_block(&self, block: ElementRef<'_>, include_abstract: bool) -> Option<SearchResult> {
        let title_el = self.selectors.find_element(&self.fields.title, block)?;
        let title = element_text(&title_el);
        if title.is_empty() {
            return None;
        }

        let mut builder = ResultBuilder::new(title, "google_scholar");

        if let Some(href) = title_el.value().attr("href") {
            builder = builder.url(href);
        }

        if let Some(byline) = self.selectors.find_text(&self.fields.byline, block) {
            let (authors, year, venue) = parse_byline(&byline);
            builder = builder.authors(authors);
            if let Some(year) = year {
                builder = builder.year(year);
            }
            if let Some(venue) = venue {
                builder = builder.journal(venue);
            }
        }

        if include_abstract {
            if let Some(snippet) = self.selectors.find_text(&self.fields.snippet, block) {
                if !snippet.is_empty() {
                    builder = builder.abstract_text(snippet);
                }
            }
        }

        if let Some(pdf) = self.selectors.find_element(&self.fields.pdf_link, block) {
            if let Some(href) = pdf.value().attr("href") {
                builder = builder.pdf_url(href);
            }
        }

        for link in self.selectors.find_elements(&self.fields.footer_links, block) {
            if let Some(count) = parse_cited_by(&element_text(&link)) {
                builder = builder.citations(count);
                break;
            }
        }

        Some(builder.build())
    }
}

/// Byline format: "A Author, B Author - Venue, 2021 - publisher.com"
fn parse_byline(byline: &str) -> (Vec<String>, Option<i32>, Option<String>) {
    let mut segments = byline.split(" - ");

    let authors: Vec<String> = segments
        .next()
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim().trim_end_matches('…').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let middle = segments.next().unwrap_or("");
    let year = year_regex()
        .find(middle)
        .or_else(|| year_regex().find(byline))
        .and_then(|m| m.as_str().parse().ok());

    let venue = middle
        .rsplit_once(',')
        .map(|(v, _)| v.trim())
        .filter(|v| !v.is_empty() && year_regex().find(v).is_none())
        .map(|v| v.to_string());

    (authors, year, venue)
}

fn parse_cited_by(text: &str) -> Option<u32> {
    let rest = text.strip_prefix("Cited by ")?;
    rest.trim().parse().ok()
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("static regex"))
}

#[async_trait]
impl Engine for GoogleScholarEngine {
    fn name(&self) -> &str {
        "google_scholar"
    }

    fn base_url(&self) -> &str {
        SCHOLAR_URL
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError> {
        let num = match query.max_results {
            0 => 20,
            n => n.min(20),
        };

        let mut params = vec![
            ("hl", "en".to_string()),
            ("q", query.query.clone()),
            ("num", num.to_string()),
        ];
        if let Some(from) = query.year_from {
            params.push(("as_ylo", from.to_string()));
        }
        if let Some(to) = query.year_to {
            params.push(("as_yhi", to.to_string()));
        }

        let response = self.fetcher.get(SCHOLAR_URL, &params).await?;
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(format!("failed to read response: {}", e)))?;

        if let Some(marker) = BLOCK_MARKERS.iter().find(|m| body.contains(*m)) {
            return Err(EngineError::Blocked(format!(
                "scholar soft-block detected ({})",
                marker.trim_start_matches("id=\"")
            )));
        }

        Ok(self.parse_page(&body, query))
    }
}
