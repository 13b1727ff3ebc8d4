//! In-memory view of the snapshot table and its read queries.

use std::collections::BTreeSet;

use crate::aggregate::{self, compare_usage_desc, MetaDimension};
use crate::models::{AggregatedProfile, LabelCount, UsageRecord};
use crate::resolve::RecordLookup;

use super::StorageError;

/// Records loaded from the store, answering every read query.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTable {
    records: Vec<UsageRecord>,
}

impl SnapshotTable {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one period, or all of them.
    pub fn period_records(&self, period: Option<&str>) -> Vec<UsageRecord> {
        self.records
            .iter()
            .filter(|r| period.map_or(true, |p| r.period == p))
            .cloned()
            .collect()
    }

    /// Distinct periods, ascending.
    pub fn list_periods(&self) -> Vec<String> {
        let periods: BTreeSet<&str> = self.records.iter().map(|r| r.period.as_str()).collect();
        periods.into_iter().map(String::from).collect()
    }

    /// Distinct names, ascending, optionally within one period.
    pub fn list_names(&self, period: Option<&str>) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| period.map_or(true, |p| r.period == p))
            .map(|r| r.name.as_str())
            .collect();
        names.into_iter().map(String::from).collect()
    }

    /// The `n` most used records of a period.
    ///
    /// Ordered by stored usage descending with missing values last, then name.
    pub fn top_n(&self, period: &str, n: usize) -> Vec<UsageRecord> {
        let mut rows = self.period_records(Some(period));
        rows.sort_by(|a, b| {
            compare_usage_desc(a.usage_fraction, b.usage_fraction)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows.truncate(n);
        rows
    }

    /// One record, matching the name case-insensitively.
    pub fn profile(&self, name: &str, period: &str) -> Option<UsageRecord> {
        self.records
            .iter()
            .find(|r| r.period == period && r.name_matches(name))
            .cloned()
    }

    /// Most recent period holding the name (case-insensitive).
    pub fn latest_period_for_name(&self, name: &str) -> Option<String> {
        self.records
            .iter()
            .filter(|r| r.name_matches(name))
            .map(|r| r.period.as_str())
            .max()
            .map(String::from)
    }

    /// The `n` highest all-time profiles.
    pub fn top_n_all_time(&self, n: usize) -> Vec<AggregatedProfile> {
        let mut profiles = aggregate::aggregate(&self.records);
        profiles.truncate(n);
        profiles
    }

    /// All-time profile of one name (case-insensitive).
    pub fn profile_all_time(&self, name: &str) -> Option<AggregatedProfile> {
        let rows: Vec<UsageRecord> = self
            .records
            .iter()
            .filter(|r| r.name_matches(name))
            .cloned()
            .collect();
        aggregate::aggregate(&rows).into_iter().next()
    }

    /// Most common values of a dimension, within one period or across all.
    pub fn top_value_counts(
        &self,
        dimension: MetaDimension,
        period: Option<&str>,
        k: usize,
    ) -> Vec<LabelCount> {
        let rows = self.period_records(period);
        aggregate::top_value_counts(&rows, dimension, k)
    }
}

impl RecordLookup for SnapshotTable {
    fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError> {
        Ok(SnapshotTable::list_names(self, period))
    }

    fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError> {
        Ok(SnapshotTable::profile(self, name, period))
    }

    fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(SnapshotTable::latest_period_for_name(self, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str, period: &str, usage: Option<f64>) -> UsageRecord {
        let mut r = UsageRecord::new(name, period);
        r.usage_fraction = usage;
        r
    }

    fn table() -> SnapshotTable {
        SnapshotTable::new(vec![
            record("Incineroar", "2025-02", Some(0.5)),
            record("Rillaboom", "2025-02", Some(0.3)),
            record("Amoonguss", "2025-02", Some(0.3)),
            record("Ditto", "2025-02", None),
            record("Incineroar", "2025-01", Some(0.4)),
            record("Urshifu", "2025-01", Some(0.35)),
        ])
    }

    #[test]
    fn test_list_periods_and_names() {
        let t = table();
        assert_eq!(t.list_periods(), vec!["2025-01", "2025-02"]);
        assert_eq!(t.list_names(Some("2025-01")), vec!["Incineroar", "Urshifu"]);
        assert_eq!(t.list_names(None).len(), 5);
        assert!(t.list_names(Some("2030-01")).is_empty());
    }

    #[test]
    fn test_top_n_ordering() {
        let names: Vec<String> = table()
            .top_n("2025-02", 10)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Incineroar", "Amoonguss", "Rillaboom", "Ditto"]);

        assert_eq!(table().top_n("2025-02", 2).len(), 2);
    }

    #[test]
    fn test_profile_case_insensitive() {
        let t = table();
        let found = t.profile("INCINEROAR", "2025-01").unwrap();
        assert_eq!(found.usage_fraction, Some(0.4));
        assert!(t.profile("Urshifu", "2025-02").is_none());
    }

    #[test]
    fn test_latest_period_for_name() {
        let t = table();
        assert_eq!(t.latest_period_for_name("incineroar").as_deref(), Some("2025-02"));
        assert_eq!(t.latest_period_for_name("Urshifu").as_deref(), Some("2025-01"));
        assert_eq!(t.latest_period_for_name("Missingno"), None);
    }

    #[test]
    fn test_all_time() {
        let t = table();
        let top = t.top_n_all_time(1);
        assert_eq!(top[0].summary.name, "Incineroar");
        assert_eq!(top[0].summary.usage_pct, Some(45.0));

        let profile = t.profile_all_time("incineroar").unwrap();
        assert_eq!(profile.period_count, 2);
        assert!(t.profile_all_time("Missingno").is_none());
    }
}
