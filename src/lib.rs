//! # Paperscout
//!
//! A multi-source academic paper crawler: one query, several engines,
//! a deduplicated union of results.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchQuery, SearchResult, etc.)
//! - [`engines`]: Per-site search engines behind a common trait
//! - [`manager`]: Concurrent fan-out across engines plus deduplication
//! - [`select`]: Multi-strategy element selection for scraped portals
//! - [`encoding`]: Charset recovery for portals with unreliable headers
//! - [`wire`]: Hand-rolled grpc-web framing and protobuf field codec
//! - [`utils`]: HTTP client, retrying fetcher, rate limiting, dedup
//! - [`config`]: Configuration management

pub mod config;
pub mod encoding;
pub mod engines;
pub mod manager;
pub mod models;
pub mod select;
pub mod utils;
pub mod wire;

// Re-export commonly used types
pub use engines::{Engine, EngineError, EngineRegistry};
pub use manager::CrawlerManager;
pub use models::{SearchQuery, SearchResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
