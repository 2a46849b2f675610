//! Crawl engines: one source-specific implementation per external site.
//!
//! Every engine implements the [`Engine`] trait. Concrete variants fall into
//! two families: REST/XML API clients ([`arxiv`], [`crossref`]) that parse
//! structured responses directly, and HTML/binary scrapers
//! ([`google_scholar`], [`cnki`], [`nstl`]) that additionally lean on the
//! selector engine, the encoding resolver, or the wire codec. The remaining
//! portals this crate grows toward are structurally repetitive instances of
//! the same two families.
//!
//! An engine's `search` never errors for ordinary "no results" or "parse
//! miss on one field" conditions; malformed individual items are logged and
//! skipped. Only fetch-layer failures and protocol-level corruption
//! propagate.

mod arxiv;
mod cnki;
mod crossref;
mod google_scholar;
mod nstl;
mod registry;

pub use arxiv::ArxivEngine;
pub use cnki::CnkiEngine;
pub use crossref::CrossrefEngine;
pub use google_scholar::GoogleScholarEngine;
pub use nstl::NstlEngine;
pub use registry::EngineRegistry;

use async_trait::async_trait;

use crate::models::{SearchQuery, SearchResult};
use crate::wire::WireError;

/// The interface every crawl engine implements.
///
/// # Implementing a New Engine
///
/// 1. Create a struct owning its own [`Fetcher`](crate::utils::Fetcher)
///    (client + rate gate); never share clients across engines
/// 2. Implement `name`, `base_url`, and `search`
/// 3. Register it in [`EngineRegistry::with_defaults`] or dynamically
#[async_trait]
pub trait Engine: Send + Sync + std::fmt::Debug {
    /// Unique, stable identifier (used in config keys, e.g. "cnki")
    fn name(&self) -> &str;

    /// Base URL of the upstream site
    fn base_url(&self) -> &str;

    /// Whether this engine needs an API key to function
    fn requires_api_key(&self) -> bool {
        false
    }

    /// Search for papers matching the query.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError>;

    /// Release the engine's HTTP client and any session state.
    ///
    /// The default is a no-op; engines whose client/session lifetime matches
    /// their own lifetime rely on drop.
    async fn close(&self) {}
}

/// Errors an engine can surface.
///
/// Parse-level misses on individual fields never become errors; these
/// variants cover the fetch layer, soft blocks, and protocol corruption.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Network-level failure (connect, timeout, transport)
    #[error("network error: {0}")]
    Network(String),

    /// Non-transient HTTP status (4xx other than 429, unexpected 5xx)
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// All retry attempts exhausted; carries the last underlying failure
    #[error("all {attempts} attempts failed: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// The site served a soft block (CAPTCHA / login interstitial) with a
    /// success status
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    /// Response body could not be parsed at all (whole-document failure)
    #[error("parse error: {0}")]
    Parse(String),

    /// Binary protocol corruption or a server-reported failure status
    #[error("protocol error: {0}")]
    Protocol(#[from] WireError),

    /// Invalid request parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An API key is required but not configured
    #[error("missing API key for {0}")]
    MissingApiKey(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_error_carries_last_failure() {
        let err = EngineError::Exhausted {
            attempts: 3,
            source: Box::new(EngineError::Http { status: 503 }),
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("503"));
    }

    #[test]
    fn test_protocol_error_from_wire() {
        let err: EngineError = WireError::ServerStatus("index offline".to_string()).into();
        assert!(matches!(err, EngineError::Protocol(_)));
        assert!(err.to_string().contains("index offline"));
    }
}
