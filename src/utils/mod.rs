//! Shared crawl infrastructure.
//!
//! - [`HttpClient`]: per-engine pooled HTTP client with explicit ownership
//! - [`RateLimiter`]: per-engine request-rate gate
//! - [`Fetcher`]: retrying fetch layer with backoff and status-aware aborts
//! - [`dedup_results`]: cross-engine result deduplication

mod dedup;
mod fetch;
mod http;
mod ratelimit;

pub use dedup::{dedup_by_fingerprint, dedup_results, merge_near_duplicates};
pub use fetch::Fetcher;
pub use http::{HttpClient, HttpClientBuilder};
pub use ratelimit::RateLimiter;
