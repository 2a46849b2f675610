//! NSTL engine: gRPC-web binary protocol client.
//!
//! NSTL's search backend speaks grpc-web+proto over plain POST. There is no
//! published schema, so requests are assembled with [`MessageBuilder`] and
//! responses walked with the schemaless [`Message`] decoder using field
//! numbers observed on the wire.
//!
//! A `guid` cookie derived from an md5 of the session start time must be
//! present or the backend returns empty pages. The bootstrap is best-effort:
//! a failure to set it degrades results but never fails the search.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engines::{Engine, EngineError};
use crate::models::{EngineMeta, ResultBuilder, SearchQuery, SearchResult};
use crate::utils::{Fetcher, HttpClient};
use crate::wire::{data_payload, Message, MessageBuilder, WireError};

const NSTL_BASE: &str = "https://www.nstl.gov.cn";
const SEARCH_RPC: &str = "/api/service/nstl/web/execute";

// Observed field numbers, search request
mod req {
    pub const QUERY: u32 = 1;
    pub const KEYWORD: u32 = 1;
    pub const PAGE: u32 = 2;
    pub const PAGE_SIZE: u32 = 3;
}

// Observed field numbers, search response
mod resp {
    pub const STATUS: u32 = 1;
    pub const ERROR: u32 = 2;
    pub const TOTAL: u32 = 3;
    pub const RESOURCE: u32 = 4;
}

// Observed field numbers, one resource entry
mod res {
    pub const PERIODICAL: u32 = 1;
    pub const ID: u32 = 2;
}

// Observed field numbers, periodical detail
mod per {
    pub const TITLE: u32 = 1;
    pub const CREATOR: u32 = 2;
    pub const ABSTRACT: u32 = 3;
    pub const YEAR: u32 = 4;
    pub const DOI: u32 = 5;
    pub const FULLTEXT_PATH: u32 = 6;
    pub const HAS_FULLTEXT: u32 = 7;
}

#[derive(Debug)]
pub struct NstlEngine {
    fetcher: Fetcher,
}

impl NstlEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let http = HttpClient::builder(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()?;
        Ok(Self {
            fetcher: Fetcher::with_client(http, config),
        })
    }

    /// Search against an explicit base URL. Tests point this at a local
    /// server; [`Engine::search`] passes the production base.
    pub async fn search_at(
        &self,
        base: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, EngineError> {
        self.bootstrap_session(base).await;

        let page_size = match query.max_results {
            0 => 100,
            n => n.min(100),
        };

        let frame = MessageBuilder::new()
            .message(
                req::QUERY,
                MessageBuilder::new()
                    .string(req::KEYWORD, &query.query)
                    .varint(req::PAGE, 1)
                    .varint(req::PAGE_SIZE, page_size as u64),
            )
            .into_frame();

        let url = format!("{}{}", base, SEARCH_RPC);
        let response = self
            .fetcher
            .execute(|client| {
                client
                    .post(&url)
                    .header("content-type", "application/grpc-web+proto")
                    .header("x-grpc-web", "1")
                    .body(frame.clone())
            })
            .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::Network(format!("failed to read response: {}", e)))?;

        let payload = data_payload(&body)?;
        let message = Message::decode(&payload)?;
        parse_response(&message, query)
    }

    /// Fetch the portal landing page so the server-set session cookie lands
    /// in the cookie store, then attach a `guid` the backend expects.
    /// Best-effort: failures are logged and swallowed.
    async fn bootstrap_session(&self, base: &str) {
        let guid = format!("{:x}", md5::compute(Utc::now().timestamp_millis().to_string()));
        let result = self
            .fetcher
            .execute(|client| client.get(base).header("cookie", format!("guid={}", guid)))
            .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "nstl session bootstrap failed, continuing without it");
        }
    }
}

fn parse_response(
    message: &Message,
    query: &SearchQuery,
) -> Result<Vec<SearchResult>, EngineError> {
    // Status 0 means the backend rejected the call; surface its message
    // loudly instead of returning a silently-empty page.
    if message.first_varint(resp::STATUS) == Some(0) {
        let detail = message
            .first_string(resp::ERROR)
            .unwrap_or_else(|| "no error detail".to_string());
        return Err(WireError::ServerStatus(detail).into());
    }

    if let Some(total) = message.first_varint(resp::TOTAL) {
        tracing::debug!(total, "nstl reported total hits");
    }

    let mut results = Vec::new();
    for resource in message.messages(resp::RESOURCE) {
        match parse_resource(&resource, query) {
            Some(result) => results.push(result),
            None => {
                tracing::debug!("skipping nstl resource without title or id");
            }
        }
        if query.max_results > 0 && results.len() >= query.max_results {
            break;
        }
    }
    Ok(results)
}

/// A resource needs both a title and a resource id to be usable; anything
/// missing either is dropped.
fn parse_resource(resource: &Message, query: &SearchQuery) -> Option<SearchResult> {
    let detail = resource.first_message(res::PERIODICAL)?;
    let id = resource.first_string(res::ID)?;
    let title = detail.first_string(per::TITLE)?;

    let mut builder = ResultBuilder::new(title, "nstl").authors(detail.strings(per::CREATOR));

    // Years outside i32 are wire garbage; drop the field, keep the record
    if let Some(year) = detail
        .first_varint(per::YEAR)
        .and_then(|y| i32::try_from(y).ok())
    {
        if !query.year_in_range(year) {
            return None;
        }
        builder = builder.year(year);
    }

    if query.include_abstract {
        if let Some(text) = detail.first_string(per::ABSTRACT) {
            builder = builder.abstract_text(text);
        }
    }

    if let Some(doi) = detail.first_string(per::DOI) {
        builder = builder.doi(doi);
    }

    let fulltext_path = detail.first_string(per::FULLTEXT_PATH);
    let has_fulltext = detail.first_varint(per::HAS_FULLTEXT) == Some(1);

    Some(
        builder
            .metadata(EngineMeta::Nstl {
                resource_id: id,
                fulltext_path,
                has_fulltext,
            })
            .build(),
    )
}

#[async_trait]
impl Engine for NstlEngine {
    fn name(&self) -> &str {
        "nstl"
    }

    fn base_url(&self) -> &str {
        NSTL_BASE
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, EngineError> {
        self.search_at(NSTL_BASE, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> NstlEngine {
        NstlEngine::new(&EngineConfig {
            rate_limit: 0.0,
            max_retries: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn resource(id: &str, title: &str, year: u64) -> MessageBuilder {
        MessageBuilder::new()
            .message(
                res::PERIODICAL,
                MessageBuilder::new()
                    .string(per::TITLE, title)
                    .string(per::CREATOR, "Chen Wei")
                    .string(per::ABSTRACT, "An abstract.")
                    .varint(per::YEAR, year)
                    .string(per::DOI, "10.9/z")
                    .string(per::FULLTEXT_PATH, "/ft/path.pdf")
                    .varint(per::HAS_FULLTEXT, 1),
            )
            .string(res::ID, id)
    }

    fn ok_response() -> Vec<u8> {
        MessageBuilder::new()
            .varint(resp::STATUS, 1)
            .varint(resp::TOTAL, 2)
            .message(resp::RESOURCE, resource("R1", "Binary Protocols in Practice", 2020))
            .message(resp::RESOURCE, resource("R2", "Another Paper", 2015))
            .into_frame()
    }

    #[tokio::test]
    async fn test_search_decodes_grpc_web_response() {
        let mut server = mockito::Server::new_async().await;
        let landing = server.mock("GET", "/").with_status(200).create_async().await;
        let rpc = server
            .mock("POST", SEARCH_RPC)
            .match_header("content-type", "application/grpc-web+proto")
            .match_header("x-grpc-web", "1")
            .with_status(200)
            .with_header("content-type", "application/grpc-web+proto")
            .with_body(ok_response())
            .create_async()
            .await;

        let results = engine()
            .search_at(&server.url(), &SearchQuery::new("binary protocols"))
            .await
            .unwrap();

        landing.assert_async().await;
        rpc.assert_async().await;
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "Binary Protocols in Practice");
        assert_eq!(first.authors, vec!["Chen Wei"]);
        assert_eq!(first.year, Some(2020));
        assert_eq!(first.doi.as_deref(), Some("10.9/z"));
        assert_eq!(
            first.metadata,
            Some(EngineMeta::Nstl {
                resource_id: "R1".to_string(),
                fulltext_path: Some("/ft/path.pdf".to_string()),
                has_fulltext: true,
            })
        );
    }

    #[tokio::test]
    async fn test_server_status_zero_is_an_error() {
        let body = MessageBuilder::new()
            .varint(resp::STATUS, 0)
            .string(resp::ERROR, "quota exceeded")
            .into_frame();

        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(200).create_async().await;
        server
            .mock("POST", SEARCH_RPC)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let err = engine()
            .search_at(&server.url(), &SearchQuery::new("x"))
            .await
            .unwrap_err();

        match err {
            EngineError::Protocol(WireError::ServerStatus(msg)) => {
                assert_eq!(msg, "quota exceeded")
            }
            other => panic!("expected ServerStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_year_filter_applies_to_decoded_resources() {
        let payload = MessageBuilder::new()
            .varint(resp::STATUS, 1)
            .message(resp::RESOURCE, resource("R1", "Recent", 2020))
            .message(resp::RESOURCE, resource("R2", "Old", 2015))
            .encode();
        let message = Message::decode(&payload).unwrap();

        let query = SearchQuery::new("x").year_from(2018);
        let results = parse_response(&message, &query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Recent");
    }

    #[test]
    fn test_overflowing_year_dropped_not_truncated() {
        let payload = MessageBuilder::new()
            .varint(resp::STATUS, 1)
            .message(resp::RESOURCE, resource("R1", "Garbled Year", u64::MAX))
            .encode();
        let message = Message::decode(&payload).unwrap();

        let results = parse_response(&message, &SearchQuery::new("x")).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].year.is_none());
    }

    #[test]
    fn test_resource_without_id_is_dropped() {
        let payload = MessageBuilder::new()
            .varint(resp::STATUS, 1)
            .message(
                resp::RESOURCE,
                MessageBuilder::new().message(
                    res::PERIODICAL,
                    MessageBuilder::new().string(per::TITLE, "No Id"),
                ),
            )
            .encode();
        let message = Message::decode(&payload).unwrap();

        let results = parse_response(&message, &SearchQuery::new("x")).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_request_frame_shape() {
        let frame = MessageBuilder::new()
            .message(
                req::QUERY,
                MessageBuilder::new()
                    .string(req::KEYWORD, "quantum")
                    .varint(req::PAGE, 1)
                    .varint(req::PAGE_SIZE, 10),
            )
            .into_frame();

        // frame header: DATA type + 4-byte big-endian length
        assert_eq!(frame[0], 0x00);
        let declared = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(declared, frame.len() - 5);

        let payload = data_payload(&frame).unwrap();
        let decoded = Message::decode(&payload).unwrap();
        let inner = decoded.first_message(req::QUERY).unwrap();
        assert_eq!(inner.first_string(req::KEYWORD).as_deref(), Some("quantum"));
        assert_eq!(inner.first_varint(req::PAGE_SIZE), Some(10));
    }
}
