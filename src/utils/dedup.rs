//! Deduplication of results merged from multiple engines.
//!
//! Primary pass: drop results whose `(title, doi, year)` fingerprint was
//! already seen, keeping first-seen order. Secondary pass: collapse
//! near-duplicates across engines whose titles are almost identical and whose
//! author lists overlap. Both passes are idempotent.

use std::collections::HashSet;
use strsim::jaro_winkler;

use crate::models::{normalize_title, SearchResult};

/// Title similarity above which two cross-engine results are candidates for
/// the fuzzy merge.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Remove exact duplicates by content fingerprint, keeping first-seen order.
pub fn dedup_by_fingerprint(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.fingerprint()))
        .collect()
}

/// Collapse near-duplicates that fingerprinting missed (e.g. one engine has
/// the DOI and the other does not). Keeps the first occurrence of each group.
pub fn merge_near_duplicates(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());

    'outer: for candidate in results {
        for existing in &kept {
            if are_near_duplicates(existing, &candidate) {
                tracing::debug!(
                    title = %candidate.title,
                    kept_source = %existing.source,
                    dropped_source = %candidate.source,
                    "merged near-duplicate result"
                );
                continue 'outer;
            }
        }
        kept.push(candidate);
    }

    kept
}

/// Full dedup pipeline: fingerprint pass then fuzzy pass.
pub fn dedup_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    merge_near_duplicates(dedup_by_fingerprint(results))
}

fn are_near_duplicates(a: &SearchResult, b: &SearchResult) -> bool {
    // Within one engine, distinct items are distinct papers
    if a.source == b.source {
        return false;
    }

    // DOI match is the strongest signal
    if let (Some(doi_a), Some(doi_b)) = (&a.doi, &b.doi) {
        if doi_a.eq_ignore_ascii_case(doi_b) {
            return true;
        }
    }

    let title_a = a.title.trim().to_lowercase();
    let title_b = b.title.trim().to_lowercase();
    if jaro_winkler(&title_a, &title_b) < TITLE_SIMILARITY_THRESHOLD {
        return false;
    }

    // Author lists are the discriminating signal once titles look alike.
    // Without them, jaro-winkler alone over-merges: short titles with a
    // shared prefix ("Result A" / "Result C") clear the threshold. Demand
    // exact normalized-title equality instead, and agreeing years where
    // both are known.
    if a.authors.is_empty() || b.authors.is_empty() {
        let same_title = normalize_title(&a.title) == normalize_title(&b.title);
        let years_agree = match (a.year, b.year) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        };
        return same_title && years_agree;
    }

    authors_overlap(a, b)
}

/// At least one author in common between two non-empty author lists.
fn authors_overlap(a: &SearchResult, b: &SearchResult) -> bool {
    let set_a: HashSet<String> = a.authors.iter().map(|s| s.trim().to_lowercase()).collect();
    b.authors
        .iter()
        .any(|author| set_a.contains(&author.trim().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultBuilder;

    fn result(title: &str, source: &str, doi: Option<&str>, year: Option<i32>) -> SearchResult {
        let mut builder = ResultBuilder::new(title, source);
        if let Some(doi) = doi {
            builder = builder.doi(doi);
        }
        if let Some(year) = year {
            builder = builder.year(year);
        }
        builder.build()
    }

    #[test]
    fn test_fingerprint_dedup_across_sources() {
        let results = vec![
            result("A Study", "crossref", Some("10.1/x"), Some(2020)),
            result("A Study", "openalex", Some("10.1/x"), Some(2020)),
            result("Another Paper", "arxiv", None, Some(2021)),
        ];

        let deduped = dedup_by_fingerprint(results);
        assert_eq!(deduped.len(), 2);
        // First-seen order kept
        assert_eq!(deduped[0].source, "crossref");
        assert_eq!(deduped[1].title, "Another Paper");
    }

    #[test]
    fn test_dedup_idempotence() {
        let results = vec![
            result("A Study", "crossref", Some("10.1/x"), Some(2020)),
            result("A Study", "openalex", Some("10.1/x"), Some(2020)),
            result("a study", "cnki", None, Some(2020)),
            result("Unrelated", "arxiv", None, None),
        ];

        let once = dedup_results(results);
        let twice = dedup_results(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }

    #[test]
    fn test_fuzzy_merge_on_doi() {
        // Fingerprints differ (years differ) but the shared DOI wins
        let results = vec![
            result("A Study", "crossref", Some("10.1/x"), Some(2020)),
            result("A Study (preprint)", "arxiv", Some("10.1/X"), None),
        ];
        let deduped = dedup_results(results);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "crossref");
    }

    #[test]
    fn test_same_source_never_merged() {
        let results = vec![
            result("Paper One", "arxiv", None, Some(2020)),
            result("Paper One", "arxiv", None, Some(2021)),
        ];
        // Different years, same source: two distinct papers
        assert_eq!(dedup_results(results).len(), 2);
    }

    #[test]
    fn test_prefix_similar_titles_without_authors_kept() {
        // "Result A" vs "Result C" score exactly at the similarity threshold
        // through the shared prefix; with no authors on either side they must
        // still survive as distinct papers.
        let results = vec![
            result("Result A", "alpha", None, None),
            result("Result C", "gamma", None, None),
        ];
        let deduped = dedup_results(results);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_identical_normalized_titles_without_authors_merge() {
        let results = vec![
            result("Deep Learning: A Survey", "crossref", None, Some(2020)),
            result("deep learning a survey!", "cnki", None, Some(2020)),
        ];
        let deduped = dedup_results(results);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "crossref");
    }

    #[test]
    fn test_identical_titles_conflicting_years_kept() {
        let results = vec![
            result("Annual Review of Fluid Mechanics", "crossref", None, Some(2019)),
            result("Annual Review of Fluid Mechanics", "openalex", None, Some(2021)),
        ];
        assert_eq!(dedup_results(results).len(), 2);
    }

    #[test]
    fn test_similar_titles_different_authors_kept() {
        let a = ResultBuilder::new("Graph Learning Methods", "crossref")
            .author("Alice Chen")
            .build();
        let b = ResultBuilder::new("Graph Learning Methods", "openalex")
            .author("Bob Müller")
            .year(1999)
            .build();
        assert_eq!(dedup_results(vec![a, b]).len(), 2);
    }
}
