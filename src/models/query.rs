//! Search query model.

use serde::{Deserialize, Serialize};

/// Parameters for a crawl search.
///
/// Immutable once constructed; passed by reference into every engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results to return per engine (0 = unlimited)
    pub max_results: usize,

    /// Lower publication-year bound (inclusive)
    pub year_from: Option<i32>,

    /// Upper publication-year bound (inclusive)
    pub year_to: Option<i32>,

    /// Whether engines should fetch/keep abstracts
    pub include_abstract: bool,

    /// Explicit subset of engine names to search (None = all enabled)
    pub engines: Option<Vec<String>>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 10,
            year_from: None,
            year_to: None,
            include_abstract: true,
            engines: None,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results per engine (0 = unlimited)
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set the lower publication-year bound
    pub fn year_from(mut self, year: i32) -> Self {
        self.year_from = Some(year);
        self
    }

    /// Set the upper publication-year bound
    pub fn year_to(mut self, year: i32) -> Self {
        self.year_to = Some(year);
        self
    }

    /// Enable/disable abstract retrieval
    pub fn include_abstract(mut self, include: bool) -> Self {
        self.include_abstract = include;
        self
    }

    /// Restrict the search to an explicit set of engines
    pub fn engines(mut self, engines: Vec<String>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// Check whether a year passes the query's bounds
    pub fn year_in_range(&self, year: i32) -> bool {
        if let Some(from) = self.year_from {
            if year < from {
                return false;
            }
        }
        if let Some(to) = self.year_to {
            if year > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new("graph neural networks")
            .max_results(25)
            .year_from(2018)
            .year_to(2022)
            .include_abstract(false);

        assert_eq!(query.query, "graph neural networks");
        assert_eq!(query.max_results, 25);
        assert_eq!(query.year_from, Some(2018));
        assert_eq!(query.year_to, Some(2022));
        assert!(!query.include_abstract);
        assert!(query.engines.is_none());
    }

    #[test]
    fn test_year_in_range() {
        let query = SearchQuery::new("x").year_from(2010).year_to(2015);
        assert!(query.year_in_range(2010));
        assert!(query.year_in_range(2015));
        assert!(!query.year_in_range(2009));
        assert!(!query.year_in_range(2016));

        let open = SearchQuery::new("x");
        assert!(open.year_in_range(1900));
        assert!(open.year_in_range(2100));
    }
}
