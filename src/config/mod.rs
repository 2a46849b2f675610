//! Configuration management.
//!
//! Settings are parsed from JSON by the surrounding application; this crate
//! only consumes the already-deserialized structures.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether this engine participates in searches
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Outbound requests per second (0 = unlimited)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f32,

    /// API key, for engines that require one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum fetch attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Full credential descriptor; takes precedence over `api_key`
    #[serde(default)]
    pub auth: Option<AuthProfile>,
}

impl EngineConfig {
    /// The credential profile to attach to outbound requests, if any.
    ///
    /// An explicit `auth` block wins; a bare `api_key` becomes an
    /// [`AuthKind::ApiKey`] profile with the default header.
    pub fn auth_profile(&self) -> Option<AuthProfile> {
        if let Some(auth) = &self.auth {
            return Some(auth.clone());
        }
        self.api_key.as_ref().map(|key| AuthProfile {
            auth_type: AuthKind::ApiKey,
            secret: Some(key.clone()),
            ..Default::default()
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: default_rate_limit(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            auth: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> f32 {
    5.0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Crawler-wide configuration: a global switch plus named engine configs.
///
/// An engine is active only if both the global flag and its own `enabled`
/// flag are true. Engines without an entry get [`EngineConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Global enable switch for the whole crawler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Named per-engine configuration
    #[serde(default)]
    pub engines: HashMap<String, EngineConfig>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engines: HashMap::new(),
        }
    }
}

impl CrawlerConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Config for one engine, falling back to defaults when unlisted
    pub fn engine(&self, name: &str) -> EngineConfig {
        self.engines.get(name).cloned().unwrap_or_default()
    }

    /// Whether an engine is actually active (global AND per-engine flag)
    pub fn is_active(&self, name: &str) -> bool {
        self.enabled && self.engine(name).enabled
    }
}

/// How an engine authenticates against its site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    None,
    CookieHeader,
    Bearer,
    ApiKey,
    CustomHeaders,
}

impl Default for AuthKind {
    fn default() -> Self {
        AuthKind::None
    }
}

/// Per-engine credential descriptor, resolved into concrete HTTP headers at
/// request time. The secret is never logged unmasked.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthProfile {
    #[serde(default)]
    pub auth_type: AuthKind,

    /// Cookie string, bearer token, or API key depending on `auth_type`
    #[serde(default)]
    pub secret: Option<String>,

    /// Extra headers sent verbatim (also the payload for `custom_headers`)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Header name carrying the API key (defaults to `X-API-Key`)
    #[serde(default)]
    pub api_key_header: Option<String>,
}

impl Default for AuthProfile {
    fn default() -> Self {
        Self {
            auth_type: AuthKind::None,
            secret: None,
            headers: HashMap::new(),
            api_key_header: None,
        }
    }
}

impl AuthProfile {
    /// Resolve this profile into `(header name, value)` pairs
    pub fn resolve(&self) -> Vec<(String, String)> {
        let mut resolved: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        match (self.auth_type, self.secret.as_deref()) {
            (AuthKind::CookieHeader, Some(secret)) => {
                resolved.push(("Cookie".to_string(), secret.to_string()));
            }
            (AuthKind::Bearer, Some(secret)) => {
                resolved.push(("Authorization".to_string(), format!("Bearer {}", secret)));
            }
            (AuthKind::ApiKey, Some(secret)) => {
                let header = self.api_key_header.as_deref().unwrap_or("X-API-Key");
                resolved.push((header.to_string(), secret.to_string()));
            }
            _ => {}
        }

        resolved
    }

    /// Attach the resolved headers to an outbound request
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in self.resolve() {
            request = request.header(name, value);
        }
        request
    }

    /// Display form of the secret: first 3 and last 4 characters kept,
    /// everything in between masked.
    pub fn masked_secret(&self) -> String {
        match self.secret.as_deref() {
            None | Some("") => "(none)".to_string(),
            Some(secret) => {
                let chars: Vec<char> = secret.chars().collect();
                if chars.len() <= 7 {
                    "*".repeat(chars.len())
                } else {
                    let head: String = chars[..3].iter().collect();
                    let tail: String = chars[chars.len() - 4..].iter().collect();
                    format!("{}{}{}", head, "*".repeat(chars.len() - 7), tail)
                }
            }
        }
    }
}

// Display never exposes the raw secret.
impl std::fmt::Display for AuthProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} secret={}", self.auth_type, self.masked_secret())
    }
}

// Debug is hand-written for the same reason: profiles ride inside Debug
// types (fetchers, engines) whose output lands in logs.
impl std::fmt::Debug for AuthProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProfile")
            .field("auth_type", &self.auth_type)
            .field("secret", &self.masked_secret())
            .field("headers", &self.headers.keys())
            .field("api_key_header", &self.api_key_header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert_eq!(config.rate_limit, 5.0);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_crawler_config_from_json() {
        let json = r#"{
            "enabled": true,
            "engines": {
                "cnki": {"enabled": false, "rate_limit": 0.5},
                "arxiv": {"rate_limit": 0}
            }
        }"#;
        let config = CrawlerConfig::from_json(json).unwrap();

        assert!(!config.is_active("cnki"));
        assert!(config.is_active("arxiv"));
        assert_eq!(config.engine("arxiv").rate_limit, 0.0);
        // Unlisted engine falls back to defaults
        assert!(config.is_active("crossref"));
        assert_eq!(config.engine("crossref").max_retries, 3);
    }

    #[test]
    fn test_global_flag_overrides_engine_flag() {
        let config = CrawlerConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!config.is_active("arxiv"));
    }

    #[test]
    fn test_auth_profile_resolve_bearer() {
        let profile = AuthProfile {
            auth_type: AuthKind::Bearer,
            secret: Some("tok_abcdef123456".to_string()),
            ..Default::default()
        };
        let headers = profile.resolve();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, "Authorization");
        assert_eq!(headers[0].1, "Bearer tok_abcdef123456");
    }

    #[test]
    fn test_auth_profile_resolve_api_key_custom_header() {
        let profile = AuthProfile {
            auth_type: AuthKind::ApiKey,
            secret: Some("key123".to_string()),
            api_key_header: Some("X-Core-Key".to_string()),
            ..Default::default()
        };
        let headers = profile.resolve();
        assert_eq!(headers[0], ("X-Core-Key".to_string(), "key123".to_string()));
    }

    #[test]
    fn test_auth_profile_from_bare_api_key() {
        let config = EngineConfig {
            api_key: Some("key123".to_string()),
            ..Default::default()
        };
        let profile = config.auth_profile().unwrap();
        assert_eq!(profile.auth_type, AuthKind::ApiKey);
        assert_eq!(profile.resolve(), vec![("X-API-Key".to_string(), "key123".to_string())]);

        // An explicit auth block wins over api_key
        let config = EngineConfig {
            api_key: Some("ignored".to_string()),
            auth: Some(AuthProfile {
                auth_type: AuthKind::Bearer,
                secret: Some("tok".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let headers = config.auth_profile().unwrap().resolve();
        assert_eq!(headers[0].0, "Authorization");
    }

    #[test]
    fn test_masked_secret() {
        let profile = AuthProfile {
            auth_type: AuthKind::Bearer,
            secret: Some("sk-0123456789abcdef".to_string()),
            ..Default::default()
        };
        let masked = profile.masked_secret();
        assert!(masked.starts_with("sk-"));
        assert!(masked.ends_with("cdef"));
        assert!(masked.contains("***"));
        assert!(!masked.contains("0123456789"));

        let short = AuthProfile {
            secret: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(short.masked_secret(), "***");
    }

    #[test]
    fn test_debug_output_masks_secret() {
        let profile = AuthProfile {
            auth_type: AuthKind::Bearer,
            secret: Some("sk-0123456789abcdef".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", profile);
        assert!(!debug.contains("0123456789"));
        assert!(debug.contains("sk-"));
    }
}
