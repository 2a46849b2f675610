//! Retrying fetch layer shared by every engine.
//!
//! Wraps one HTTP call with bounded retries, exponential backoff, and
//! status-code-aware abort/continue decisions. Every attempt passes through
//! the engine's own [`RateLimiter`] first.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{AuthProfile, EngineConfig};
use crate::engines::EngineError;
use crate::utils::{HttpClient, RateLimiter};

/// Retrying fetcher owned by one engine: client, rate gate, retry budget,
/// and the engine's credentials.
#[derive(Debug)]
pub struct Fetcher {
    http: HttpClient,
    limiter: RateLimiter,
    max_retries: u32,
    backoff_base: Duration,
    auth: Option<AuthProfile>,
}

impl Fetcher {
    /// Build a fetcher from an engine config with the default client
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let http = HttpClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_client(http, config))
    }

    /// Build a fetcher around an already-configured client
    pub fn with_client(http: HttpClient, config: &EngineConfig) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(config.rate_limit),
            max_retries: config.max_retries.max(1),
            backoff_base: Duration::from_secs(1),
            auth: config.auth_profile(),
        }
    }

    /// Override the backoff base interval (tests shrink it)
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// The underlying client, for engines that need raw request control
    pub fn client(&self) -> &Client {
        self.http.client()
    }

    /// GET a URL with query parameters
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, EngineError> {
        self.execute(|client| client.get(url).query(query)).await
    }

    /// POST a form-encoded body
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<Response, EngineError> {
        self.execute(|client| client.post(url).form(form)).await
    }

    /// Perform a request built by `build`, retrying per the fetch policy.
    ///
    /// Policy:
    /// - 2xx (and any success after redirects) returns immediately
    /// - 429/503/504 retries after `base * 2^(attempt-1)`
    /// - any other 4xx/5xx aborts immediately, no retry
    /// - network errors and timeouts retry with the same backoff
    /// - exhausting all attempts yields one aggregated error carrying the
    ///   last underlying failure
    pub async fn execute<F>(&self, build: F) -> Result<Response, EngineError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut last_error = EngineError::Other("no attempts made".to_string());

        for attempt in 1..=self.max_retries {
            self.limiter.acquire().await;

            let mut request = build(self.http.client());
            if let Some(profile) = &self.auth {
                request = profile.apply(request);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status.is_redirection() {
                        return Ok(response);
                    }
                    if !is_transient_status(status) {
                        // Non-transient 4xx/5xx: pointless to retry
                        return Err(EngineError::Http {
                            status: status.as_u16(),
                        });
                    }
                    last_error = EngineError::Http {
                        status: status.as_u16(),
                    };
                }
                Err(e) => {
                    last_error = EngineError::Network(e.to_string());
                }
            }

            if attempt < self.max_retries {
                let delay = self.backoff_base * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(
                    attempt,
                    max = self.max_retries,
                    ?delay,
                    error = %last_error,
                    "transient fetch failure, backing off"
                );
                sleep(delay).await;
            }
        }

        Err(EngineError::Exhausted {
            attempts: self.max_retries,
            source: Box::new(last_error),
        })
    }
}

/// Status codes worth retrying: rate limiting and transient upstream outages.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(max_retries: u32) -> EngineConfig {
        EngineConfig {
            rate_limit: 0.0,
            max_retries,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn fast_fetcher(max_retries: u32) -> Fetcher {
        Fetcher::new(&test_config(max_retries))
            .unwrap()
            .backoff_base(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_retry_ceiling_on_503() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/busy")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let fetcher = fast_fetcher(3);
        let url = format!("{}/busy", server.url());
        let result = fetcher.execute(|c| c.get(&url)).await;

        mock.assert_async().await;
        match result {
            Err(EngineError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, EngineError::Http { status: 503 }));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_4xx_aborts_immediately() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let fetcher = fast_fetcher(5);
        let url = format!("{}/missing", server.url());
        let result = fetcher.execute(|c| c.get(&url)).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(EngineError::Http { status: 404 })));
    }

    #[tokio::test]
    async fn test_api_key_header_attached_to_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_header("x-api-key", "sekret-key-1234")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let config = EngineConfig {
            rate_limit: 0.0,
            max_retries: 1,
            api_key: Some("sekret-key-1234".to_string()),
            ..Default::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let url = format!("{}/works", server.url());
        fetcher.execute(|c| c.get(&url)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_returns_without_retrying() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("fine")
            .expect(1)
            .create_async()
            .await;

        let fetcher = fast_fetcher(5);
        let url = format!("{}/ok", server.url());
        let response = fetcher.execute(|c| c.get(&url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text().await.unwrap(), "fine");
    }
}
