//! Transient query results: name candidates, resolved and aggregated profiles.

use serde::{Deserialize, Serialize};

use super::{UsageRecord, UsageSummary};

/// Which resolution tier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Substring,
    Fuzzy,
}

/// A known name ranked against a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub name: String,
    pub kind: MatchKind,
    /// 0.0 - 1.0, higher is better
    pub score: f64,
}

/// All-time rollup for one name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProfile {
    /// Means and modes on the percent scale
    #[serde(flatten)]
    pub summary: UsageSummary,

    /// Number of periods the name appears in
    pub period_count: usize,
}

/// A per-period profile after fallback resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProfile {
    pub requested_name: String,
    pub requested_period: String,
    pub name: String,
    pub period: String,
    pub record: UsageRecord,
    /// Set when the name or period differs from the request
    pub substituted: bool,
}

impl ResolvedProfile {
    pub fn new(requested_name: &str, requested_period: &str, record: UsageRecord) -> Self {
        let substituted = record.period != requested_period
            || record.name.to_lowercase() != requested_name.to_lowercase();
        Self {
            requested_name: requested_name.to_string(),
            requested_period: requested_period.to_string(),
            name: record.name.clone(),
            period: record.period.clone(),
            record,
            substituted,
        }
    }
}

/// A label with how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u32,
}
