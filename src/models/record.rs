//! Normalized search result model shared by every engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Engine-specific metadata carried alongside a result.
///
/// The downloader reads these to perform the actual fetch; each engine family
/// has its own shape instead of an untyped string map, so the ingestion
/// boundary stays type-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineMeta {
    /// CNKI document coordinates needed to resolve a download URL
    Cnki {
        db_code: String,
        db_name: String,
        file_name: String,
    },
    /// Wanfang internal object id plus the per-session download token
    Wanfang {
        object_id: String,
        download_token: Option<String>,
    },
    /// NSTL resource id and full-text location from the binary response
    Nstl {
        resource_id: String,
        fulltext_path: Option<String>,
        has_fulltext: bool,
    },
    /// Escape hatch for fields with no dedicated shape yet
    Extra(HashMap<String, String>),
}

/// A paper found by one engine, normalized into the shared result shape.
///
/// `title` and `source` are always present; everything else is best-effort.
/// Partial metadata is strictly better than losing the paper entirely, so
/// engines leave fields empty rather than dropping an item over one parse
/// miss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Paper title (required, non-empty)
    pub title: String,

    /// Authors in citation order
    pub authors: Vec<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// arXiv identifier (for preprints)
    pub arxiv_id: Option<String>,

    /// Paper landing page URL
    pub url: Option<String>,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Name of the engine that produced this result
    pub source: String,

    /// Journal / venue name
    pub journal: Option<String>,

    /// Volume
    pub volume: Option<String>,

    /// Issue
    pub issue: Option<String>,

    /// Page range
    pub pages: Option<String>,

    /// Citation count
    pub citation_count: Option<u32>,

    /// Engine-specific extra fields (download tokens, site-internal ids)
    pub metadata: Option<EngineMeta>,
}

impl SearchResult {
    /// Create a result with the required fields
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            year: None,
            doi: None,
            arxiv_id: None,
            url: None,
            pdf_url: None,
            abstract_text: None,
            source: source.into(),
            journal: None,
            volume: None,
            issue: None,
            pages: None,
            citation_count: None,
            metadata: None,
        }
    }

    /// Content fingerprint over `(title, doi, year)`.
    ///
    /// Pure function of the bibliographic identity: two results with the same
    /// fingerprint are the same paper regardless of which engine found them.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_title(&self.title).as_bytes());
        hasher.update(b"|");
        hasher.update(
            self.doi
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase()
                .as_bytes(),
        );
        hasher.update(b"|");
        if let Some(year) = self.year {
            hasher.update(year.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Whether the downloader has anything to work with
    pub fn has_download_target(&self) -> bool {
        self.pdf_url.is_some() || self.url.is_some() || self.doi.is_some()
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub(crate) fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builder for constructing [`SearchResult`] values
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    result: SearchResult,
}

impl ResultBuilder {
    /// Create a new builder with the required fields
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            result: SearchResult::new(title, source),
        }
    }

    /// Set the author list
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.result.authors = authors;
        self
    }

    /// Append one author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.result.authors.push(author.into());
        self
    }

    /// Set publication year
    pub fn year(mut self, year: i32) -> Self {
        self.result.year = Some(year);
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.result.doi = Some(doi.into());
        self
    }

    /// Set arXiv id
    pub fn arxiv_id(mut self, id: impl Into<String>) -> Self {
        self.result.arxiv_id = Some(id.into());
        self
    }

    /// Set landing page URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.result.url = Some(url.into());
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.result.pdf_url = Some(url.into());
        self
    }

    /// Set abstract text
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.result.abstract_text = Some(text.into());
        self
    }

    /// Set journal / venue
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.result.journal = Some(journal.into());
        self
    }

    /// Set volume
    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.result.volume = Some(volume.into());
        self
    }

    /// Set issue
    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.result.issue = Some(issue.into());
        self
    }

    /// Set page range
    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.result.pages = Some(pages.into());
        self
    }

    /// Set citation count
    pub fn citations(mut self, count: u32) -> Self {
        self.result.citation_count = Some(count);
        self
    }

    /// Attach engine-specific metadata
    pub fn metadata(mut self, meta: EngineMeta) -> Self {
        self.result.metadata = Some(meta);
        self
    }

    /// Build the result
    pub fn build(self) -> SearchResult {
        self.result
    }
}
