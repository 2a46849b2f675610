//! Registry holding one instance of every engine.

use std::sync::Arc;

use super::{
    ArxivEngine, CnkiEngine, CrossrefEngine, Engine, EngineError, GoogleScholarEngine, NstlEngine,
};
use crate::config::CrawlerConfig;

/// Insertion-ordered collection of engines with name lookup.
///
/// Order matters: the manager merges results in registration order for
/// deterministic dedup on deterministic inputs.
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in engine, configured from `config`.
    pub fn with_defaults(config: &CrawlerConfig) -> Result<Self, EngineError> {
        let mut registry = Self::new();
        registry.register(Arc::new(ArxivEngine::new(&config.engine("arxiv"))?));
        registry.register(Arc::new(CrossrefEngine::new(&config.engine("crossref"))?));
        registry.register(Arc::new(GoogleScholarEngine::new(
            &config.engine("google_scholar"),
        )?));
        registry.register(Arc::new(CnkiEngine::new(&config.engine("cnki"))?));
        registry.register(Arc::new(NstlEngine::new(&config.engine("nstl"))?));
        Ok(registry)
    }

    /// Register an engine; a duplicate name replaces the earlier instance.
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        if let Some(existing) = self
            .engines
            .iter_mut()
            .find(|e| e.name() == engine.name())
        {
            *existing = engine;
        } else {
            self.engines.push(engine);
        }
    }

    /// Look up an engine by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Engine>> {
        self.engines.iter().find(|e| e.name() == name)
    }

    /// All engines, in registration order
    pub fn all(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }

    /// All engine names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
