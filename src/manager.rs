//! Crawl orchestration: fan a query out across engines, collect what comes
//! back, deduplicate the union.
//!
//! The manager owns the [`EngineRegistry`] explicitly; callers construct one
//! manager per configuration and share it behind whatever synchronization
//! they need. Engine failures are isolated: one engine erroring (or being
//! blocked) costs only that engine's results, never the search.

use futures_util::future::join_all;
use std::sync::Arc;

use crate::config::CrawlerConfig;
use crate::engines::{Engine, EngineError, EngineRegistry};
use crate::models::{SearchQuery, SearchResult};
use crate::utils::dedup_results;

pub struct CrawlerManager {
    config: CrawlerConfig,
    registry: EngineRegistry,
}

impl CrawlerManager {
    /// Build a manager with the default engine set.
    pub fn new(config: CrawlerConfig) -> Result<Self, EngineError> {
        let registry = EngineRegistry::with_defaults(&config)?;
        Ok(Self { config, registry })
    }

    /// Build a manager around an explicit registry. Tests inject stub
    /// engines this way.
    pub fn with_registry(config: CrawlerConfig, registry: EngineRegistry) -> Self {
        Self { config, registry }
    }

    /// Names of every registered engine, in registration order.
    pub fn list_engines(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Names of engines that are currently enabled by configuration.
    pub fn list_enabled(&self) -> Vec<&str> {
        self.registry
            .names()
            .into_iter()
            .filter(|name| self.config.is_active(name))
            .collect()
    }

    /// Look up one engine by name.
    pub fn engine(&self, name: &str) -> Option<&Arc<dyn Engine>> {
        self.registry.get(name)
    }

    /// Run `query` against the target engines concurrently and return the
    /// deduplicated union of their results.
    ///
    /// The target set is `query.engines` when given, otherwise every enabled
    /// engine. Unknown or disabled requested names are logged and skipped.
    /// This never fails: an engine that errors contributes nothing.
    pub async fn search(&self, query: &SearchQuery) -> Vec<SearchResult> {
        let targets = self.targets(query);
        if targets.is_empty() {
            tracing::warn!(query = %query.query, "no engines available for search");
            return Vec::new();
        }

        tracing::info!(
            query = %query.query,
            engines = ?targets.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "dispatching search"
        );

        let futures = targets.iter().map(|engine| {
            let engine = Arc::clone(engine);
            async move {
                let name = engine.name().to_string();
                (name, engine.search(query).await)
            }
        });

        let mut combined = Vec::new();
        for (name, outcome) in join_all(futures).await {
            match outcome {
                Ok(results) => {
                    tracing::debug!(engine = %name, count = results.len(), "engine returned");
                    combined.extend(results);
                }
                Err(e) => {
                    tracing::warn!(engine = %name, error = %e, "engine failed, excluding it");
                }
            }
        }

        let before = combined.len();
        let deduped = dedup_results(combined);
        if deduped.len() < before {
            tracing::debug!(
                before,
                after = deduped.len(),
                "removed duplicates across engines"
            );
        }
        deduped
    }

    /// Shut every engine down. Call once, when the manager is retired.
    pub async fn close(&self) {
        for engine in self.registry.all() {
            engine.close().await;
        }
    }

    fn targets(&self, query: &SearchQuery) -> Vec<Arc<dyn Engine>> {
        match &query.engines {
            // An explicit subset narrows the target set; it never overrides
            // the global or per-engine disable flags.
            Some(requested) => requested
                .iter()
                .filter_map(|name| {
                    if !self.config.is_active(name) {
                        tracing::warn!(engine = %name, "requested engine is disabled by configuration");
                        return None;
                    }
                    let engine = self.registry.get(name);
                    if engine.is_none() {
                        tracing::warn!(engine = %name, "requested engine is not registered");
                    }
                    engine.cloned()
                })
                .collect(),
            None => self
                .registry
                .all()
                .iter()
                .filter(|engine| self.config.is_active(engine.name()))
                .cloned()
                .collect(),
        }
    }
}

impl std::fmt::Debug for CrawlerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerManager")
            .field("engines", &self.registry.names())
            .finish()
    }
}
