//! Name resolution.
//!
//! Maps a free-text query onto known entity names in three tiers:
//! 1. Exact match after normalization (short-circuits the other tiers)
//! 2. Substring match in either direction, fixed score
//! 3. Fuzzy match by [`Similarity`] score above a cutoff

pub mod profile;
pub mod similarity;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{CandidateMatch, MatchKind};

pub use profile::{ProfileResolver, RecordLookup};
pub use similarity::{MatchingBlocksRatio, Similarity};

/// Default number of candidates returned.
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Default minimum fuzzy score.
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Score given to every substring match.
pub const SUBSTRING_SCORE: f64 = 0.95;

/// Dash look-alikes folded into a plain hyphen.
const DASH_VARIANTS: &[char] = &['_', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2212}'];

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9 -]").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonical form used for every comparison.
///
/// Lowercases, folds dash variants and underscores to `-`, replaces anything outside
/// `[a-z0-9 -]` with a space, then collapses and trims whitespace.
pub fn normalize_name(s: &str) -> String {
    let lowered: String = s
        .to_lowercase()
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    let cleaned = DISALLOWED.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// Tuning for [`NameResolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverOptions {
    /// Maximum candidates returned
    pub max_candidates: usize,
    /// Fuzzy scores below this are dropped
    pub cutoff: f64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

/// Ranks a name universe against a query. Deterministic for a fixed input.
#[derive(Debug, Clone)]
pub struct NameResolver<S = MatchingBlocksRatio> {
    similarity: S,
    options: ResolverOptions,
}

impl NameResolver<MatchingBlocksRatio> {
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_similarity(MatchingBlocksRatio, options)
    }
}

impl Default for NameResolver<MatchingBlocksRatio> {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl<S: Similarity> NameResolver<S> {
    pub fn with_similarity(similarity: S, options: ResolverOptions) -> Self {
        Self {
            similarity,
            options,
        }
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Rank `names` against `query`.
    ///
    /// An empty query (or one with nothing left after normalization) or an empty
    /// universe gives no candidates.
    pub fn resolve(&self, query: &str, names: &[String]) -> Vec<CandidateMatch> {
        let k = self.options.max_candidates;
        let q = normalize_name(query);
        if q.is_empty() || names.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut exact = Vec::new();
        let mut substring = Vec::new();
        let mut fuzzy = Vec::new();

        for name in names {
            let n = normalize_name(name);
            if n == q {
                exact.push(CandidateMatch {
                    name: name.clone(),
                    kind: MatchKind::Exact,
                    score: 1.0,
                });
            } else if n.contains(&q) || q.contains(&n) {
                substring.push(CandidateMatch {
                    name: name.clone(),
                    kind: MatchKind::Substring,
                    score: SUBSTRING_SCORE,
                });
            } else {
                let score = self.similarity.similarity(&q, &n);
                if score >= self.options.cutoff {
                    fuzzy.push(CandidateMatch {
                        name: name.clone(),
                        kind: MatchKind::Fuzzy,
                        score,
                    });
                }
            }
        }

        if !exact.is_empty() {
            exact.truncate(k);
            return exact;
        }

        // Stable: equal scores keep universe order
        fuzzy.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut seen = HashSet::new();
        substring
            .into_iter()
            .chain(fuzzy)
            .filter(|c| seen.insert(c.name.clone()))
            .take(k)
            .collect()
    }
}

/// Rank with the default similarity measure.
pub fn best_name_candidates(
    query: &str,
    names: &[String],
    max_candidates: usize,
    cutoff: f64,
) -> Vec<CandidateMatch> {
    NameResolver::new(ResolverOptions {
        max_candidates,
        cutoff,
    })
    .resolve(query, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn universe(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn names_of(candidates: &[CandidateMatch]) -> Vec<&str> {
        candidates.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Urshifu\u{2013}Rapid_Strike!!"), "urshifu-rapid-strike");
        assert_eq!(normalize_name("  Tapu   Koko (Alt) "), "tapu koko alt");
        assert_eq!(normalize_name("Farfetch\u{2019}d"), "farfetch d");
        assert_eq!(normalize_name("Mr. Mime\u{2014}Galar"), "mr mime-galar");
        assert_eq!(normalize_name("???"), "");
    }

    #[test]
    fn test_exact_bucket_short_circuits() {
        let mut names = universe(&["URSHIFU", "Urshifu-Rapid-Strike", "urshifu"]);
        for i in 0..500 {
            names.push(format!("Urshifu Variant {}", i));
        }

        let result = best_name_candidates("Urshifu", &names, 5, 0.6);
        assert_eq!(names_of(&result), vec!["URSHIFU", "urshifu"]);
        assert!(result.iter().all(|c| c.kind == MatchKind::Exact));
    }

    #[test]
    fn test_substring_bucket_keeps_universe_order() {
        let names = universe(&["Zacian-Crowned", "Zamazenta", "Zacian-Hero"]);
        let result = best_name_candidates("zaci", &names, 5, 0.6);

        assert_eq!(names_of(&result), vec!["Zacian-Crowned", "Zacian-Hero"]);
        assert!(result.iter().all(|c| c.score == SUBSTRING_SCORE));
    }

    #[test]
    fn test_query_containing_candidate_is_substring() {
        let names = universe(&["Ogerpon", "Ogerpon-Wellspring"]);
        let result = best_name_candidates("ogerpon wellspring mask", &names, 5, 0.6);
        assert_eq!(result[0].name, "Ogerpon");
        assert_eq!(result[0].kind, MatchKind::Substring);
    }

    #[test]
    fn test_fuzzy_bucket_after_substrings() {
        let names = universe(&["Iron Hands", "Flutter Mane", "Farigiraf", "Fluttermane Fan"]);
        let result = best_name_candidates("fluter mane", &names, 5, 0.6);

        assert_eq!(result[0].name, "Flutter Mane");
        assert_eq!(result[0].kind, MatchKind::Fuzzy);
        assert!((result[0].score - 22.0 / 23.0).abs() < 1e-12);
        assert!(!names_of(&result).contains(&"Iron Hands"));
    }

    #[test]
    fn test_fuzzy_sorted_by_score() {
        let names = universe(&["Amoongus", "Amoonguss"]);
        let result = best_name_candidates("amonguss", &names, 5, 0.6);
        assert_eq!(names_of(&result), vec!["Amoonguss", "Amoongus"]);
        assert!(result[0].score > result[1].score);
    }

    #[test]
    fn test_cutoff_discards_weak_matches() {
        let names = universe(&["Incineroar", "Rillaboom"]);
        assert!(best_name_candidates("xyz", &names, 5, 0.6).is_empty());
        assert_eq!(best_name_candidates("xyz", &names, 5, 0.0).len(), 2);
    }

    #[test]
    fn test_truncates_to_k() {
        let names = universe(&["Ogerpon", "Ogerpon-Wellspring", "Ogerpon-Hearthflame", "Ogerpon-Cornerstone"]);
        let result = best_name_candidates("ogerpon-", &names, 2, 0.6);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let names = universe(&["Incineroar"]);
        assert!(best_name_candidates("", &names, 5, 0.6).is_empty());
        assert!(best_name_candidates("   ", &names, 5, 0.6).is_empty());
        assert!(best_name_candidates("incin", &[], 5, 0.6).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let names = universe(&[
            "Chien-Pao", "Chi-Yu", "Ting-Lu", "Wo-Chien", "Chien Pao Fan", "Chimecho",
        ]);
        let first = best_name_candidates("chien", &names, 5, 0.3);
        for _ in 0..10 {
            assert_eq!(best_name_candidates("chien", &names, 5, 0.3), first);
        }
    }

    struct FirstLetter;

    impl Similarity for FirstLetter {
        fn similarity(&self, a: &str, b: &str) -> f64 {
            if a.chars().next() == b.chars().next() {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_custom_similarity() {
        let resolver = NameResolver::with_similarity(FirstLetter, ResolverOptions::default());
        let names = universe(&["Rillaboom", "Raging Bolt", "Kingambit"]);
        let result = resolver.resolve("ruinous", &names);
        assert_eq!(names_of(&result), vec!["Rillaboom", "Raging Bolt"]);
    }
}
