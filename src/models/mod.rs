//! Core data models for search queries and normalized results.

mod query;
mod record;

pub use query::SearchQuery;
pub(crate) use record::normalize_title;
pub use record::{EngineMeta, ResultBuilder, SearchResult};
