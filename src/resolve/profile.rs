//! Per-period profile lookup with fallback.

use tracing::debug;

use super::{NameResolver, Similarity};
use crate::models::{CandidateMatch, ResolvedProfile, UsageRecord};
use crate::storage::StorageError;

/// Read access the profile resolver needs from the record store.
pub trait RecordLookup {
    /// Distinct names, for one period or across all of them.
    fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Case-insensitive exact lookup of one record.
    fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError>;

    /// Latest period holding a record for the name (case-insensitive).
    fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError>;
}

/// Resolves queries into concrete records, substituting when the exact one is missing.
pub struct ProfileResolver<'a, L: ?Sized, S> {
    lookup: &'a L,
    resolver: &'a NameResolver<S>,
}

impl<'a, L, S> ProfileResolver<'a, L, S>
where
    L: RecordLookup + ?Sized,
    S: Similarity,
{
    pub fn new(lookup: &'a L, resolver: &'a NameResolver<S>) -> Self {
        Self { lookup, resolver }
    }

    /// Candidates for a query.
    ///
    /// With a period, names from that period are searched first; an empty result falls
    /// back to the names of every period.
    pub fn candidates(
        &self,
        query: &str,
        period: Option<&str>,
    ) -> Result<Vec<CandidateMatch>, StorageError> {
        if let Some(period) = period {
            let names = self.lookup.list_names(Some(period))?;
            let found = self.resolver.resolve(query, &names);
            if !found.is_empty() {
                return Ok(found);
            }
            debug!(query, period, "No candidates in period, searching all periods");
        }

        let names = self.lookup.list_names(None)?;
        Ok(self.resolver.resolve(query, &names))
    }

    /// Find a record for `name` in `period`, falling back in order to:
    /// the latest period holding `name`, then the latest period of each alternate.
    ///
    /// Alternates equal to `name` (ignoring case) are skipped.
    pub fn resolve(
        &self,
        name: &str,
        period: &str,
        alternates: &[String],
    ) -> Result<Option<ResolvedProfile>, StorageError> {
        if let Some(record) = self.lookup.profile(name, period)? {
            return Ok(Some(ResolvedProfile::new(name, period, record)));
        }

        if let Some(latest) = self.lookup.latest_period_for_name(name)? {
            if let Some(record) = self.lookup.profile(name, &latest)? {
                debug!(name, period, latest = %latest, "Using latest period for name");
                return Ok(Some(ResolvedProfile::new(name, period, record)));
            }
        }

        let picked = name.to_lowercase();
        for alternate in alternates {
            if alternate.to_lowercase() == picked {
                continue;
            }
            let Some(latest) = self.lookup.latest_period_for_name(alternate)? else {
                continue;
            };
            if let Some(record) = self.lookup.profile(alternate, &latest)? {
                debug!(name, period, alternate = %alternate, latest = %latest, "Using alternate candidate");
                return Ok(Some(ResolvedProfile::new(name, period, record)));
            }
        }

        Ok(None)
    }

    /// Candidates for `query`, then [`Self::resolve`] on the best one with the rest
    /// as alternates.
    pub fn resolve_query(
        &self,
        query: &str,
        period: &str,
    ) -> Result<Option<ResolvedProfile>, StorageError> {
        let candidates = self.candidates(query, Some(period))?;
        let Some((best, rest)) = candidates.split_first() else {
            return Ok(None);
        };
        let alternates: Vec<String> = rest.iter().map(|c| c.name.clone()).collect();
        self.resolve(&best.name, period, &alternates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SnapshotTable;
    use pretty_assertions::assert_eq;

    fn record(name: &str, period: &str, usage: f64) -> UsageRecord {
        let mut r = UsageRecord::new(name, period);
        r.usage_fraction = Some(usage);
        r
    }

    fn table() -> SnapshotTable {
        SnapshotTable::new(vec![
            record("Incineroar", "2025-01", 0.5),
            record("Incineroar", "2025-03", 0.48),
            record("Yveltal", "2025-01", 0.2),
            record("Zacian-Crowned", "2025-03", 0.3),
            record("Zamazenta", "2025-03", 0.1),
        ])
    }

    #[test]
    fn test_resolve_exact() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        let resolved = profiles.resolve("incineroar", "2025-03", &[]).unwrap().unwrap();
        assert_eq!(resolved.name, "Incineroar");
        assert_eq!(resolved.period, "2025-03");
        assert!(!resolved.substituted);
    }

    #[test]
    fn test_resolve_falls_back_to_latest_period() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        let resolved = profiles.resolve("Yveltal", "2025-03", &[]).unwrap().unwrap();
        assert_eq!(resolved.period, "2025-01");
        assert_eq!(resolved.record.usage_fraction, Some(0.2));
        assert!(resolved.substituted);
    }

    #[test]
    fn test_resolve_uses_alternates() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        let alternates = vec!["MISSINGNO".to_string(), "Zamazenta".to_string()];
        let resolved = profiles
            .resolve("Missingno", "2025-03", &alternates)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name, "Zamazenta");
        assert!(resolved.substituted);

        // An alternate only present in an older period is taken from there
        let alternates = vec!["Yveltal".to_string()];
        let resolved = profiles
            .resolve("Missingno", "2025-03", &alternates)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name, "Yveltal");
        assert_eq!(resolved.period, "2025-01");
    }

    #[test]
    fn test_resolve_nothing_found() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        assert!(profiles.resolve("Missingno", "2025-03", &[]).unwrap().is_none());
    }

    #[test]
    fn test_candidates_fall_back_to_all_periods() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        let in_period = profiles.candidates("zaci", Some("2025-03")).unwrap();
        assert_eq!(in_period[0].name, "Zacian-Crowned");

        let fallback = profiles.candidates("yveltal", Some("2025-03")).unwrap();
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].name, "Yveltal");
    }

    #[test]
    fn test_resolve_query() {
        let t = table();
        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&t, &resolver);

        let resolved = profiles.resolve_query("incinaroar", "2025-01").unwrap().unwrap();
        assert_eq!(resolved.name, "Incineroar");
        assert!(!resolved.substituted);

        assert!(profiles.resolve_query("", "2025-01").unwrap().is_none());
    }
}
