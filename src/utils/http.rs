//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::engines::EngineError;

/// HTTP client owned by exactly one engine.
///
/// Built once at engine construction (connection pool plus cookie jar) and
/// released when the engine is closed; there is no lazily-initialized shared
/// state behind it.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with the crate's default user agent
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        Self::builder(timeout).build()
    }

    /// Start configuring a client
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            cookies: false,
        }
    }

    /// The underlying reqwest client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builder for per-engine HTTP clients
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: String,
    cookies: bool,
}

impl HttpClientBuilder {
    /// Override the user agent (several portals reject non-browser agents)
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable the cookie jar (session-tracking portals need it)
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookies = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient, EngineError> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .cookie_store(self.cookies)
            .build()
            .map_err(|e| EngineError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpClient {
            client: Arc::new(client),
        })
    }
}
