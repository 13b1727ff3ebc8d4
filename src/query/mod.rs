//! Cached read access to the snapshot store.
//!
//! `QueryService` owns the store handle, the name resolver and a result cache keyed
//! by query and arguments. Cached results are dropped whenever the table file's stamp
//! changes, or on an explicit [`QueryService::invalidate`].

pub mod cache;

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::aggregate::MetaDimension;
use crate::models::{AggregatedProfile, CandidateMatch, LabelCount, ResolvedProfile, UsageRecord};
use crate::resolve::{NameResolver, ProfileResolver, RecordLookup};
use crate::storage::{FileStamp, SnapshotStore, StorageError};

pub use cache::{CacheKey, Cacheable, QueryCache};

/// An all-time profile found for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAllTime {
    pub requested_name: String,
    pub profile: AggregatedProfile,
    pub substituted: bool,
}

pub struct QueryService {
    store: SnapshotStore,
    resolver: NameResolver,
    cache: QueryCache,
    /// Stamp of the table file the cached results were read from
    stamp: Mutex<Option<FileStamp>>,
}

impl QueryService {
    pub fn new(store: SnapshotStore, resolver: NameResolver) -> Self {
        Self {
            store,
            resolver,
            cache: QueryCache::new(),
            stamp: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Drop every cached result. Returns how many were dropped.
    pub fn invalidate(&self) -> usize {
        let dropped = self.cache.len();
        debug!("Invalidating {} cached query results", dropped);
        self.cache.clear();
        dropped
    }

    /// Clear the cache if the table file was rewritten since the last read.
    fn revalidate(&self) {
        let current = self.store.stamp();
        let mut seen = self.stamp.lock().unwrap_or_else(PoisonError::into_inner);
        if *seen != current {
            debug!("Snapshot table stamp changed to {:?}", current);
            self.invalidate();
            *seen = current;
        }
    }

    fn cached<T, F>(&self, key: CacheKey, load: F) -> Result<T, StorageError>
    where
        T: Cacheable + Clone,
        F: FnOnce(&SnapshotStore) -> Result<T, StorageError>,
    {
        self.revalidate();
        if let Some(hit) = self.cache.get::<T>(&key) {
            return Ok(hit);
        }
        let value = load(&self.store)?;
        self.cache.insert(key, &value);
        Ok(value)
    }

    pub fn list_periods(&self) -> Result<Vec<String>, StorageError> {
        self.cached(CacheKey::Periods, |s| s.list_periods())
    }

    pub fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError> {
        self.cached(CacheKey::Names(period.map(String::from)), |s| {
            s.list_names(period)
        })
    }

    pub fn top_n(&self, period: &str, n: usize) -> Result<Vec<UsageRecord>, StorageError> {
        let key = CacheKey::TopN {
            period: period.to_string(),
            n,
        };
        self.cached(key, |s| s.top_n(period, n))
    }

    pub fn top_n_all_time(&self, n: usize) -> Result<Vec<AggregatedProfile>, StorageError> {
        self.cached(CacheKey::TopNAllTime(n), |s| s.top_n_all_time(n))
    }

    pub fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError> {
        let key = CacheKey::Profile {
            name: name.to_lowercase(),
            period: period.to_string(),
        };
        self.cached(key, |s| s.profile(name, period))
    }

    pub fn profile_all_time(&self, name: &str) -> Result<Option<AggregatedProfile>, StorageError> {
        self.cached(CacheKey::ProfileAllTime(name.to_lowercase()), |s| {
            s.profile_all_time(name)
        })
    }

    pub fn top_value_counts(
        &self,
        dimension: MetaDimension,
        period: Option<&str>,
        k: usize,
    ) -> Result<Vec<LabelCount>, StorageError> {
        let key = CacheKey::TopValues {
            dimension,
            period: period.map(String::from),
            k,
        };
        self.cached(key, |s| s.top_value_counts(dimension, period, k))
    }

    /// Always read from the store, so a freshly ingested period is seen at once.
    pub fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.store.latest_period_for_name(name)
    }

    /// Ranked names for a query, preferring the given period's names.
    pub fn candidates(
        &self,
        query: &str,
        period: Option<&str>,
    ) -> Result<Vec<CandidateMatch>, StorageError> {
        ProfileResolver::new(self, &self.resolver).candidates(query, period)
    }

    /// Per-period profile for a free-text query, with fallback.
    pub fn resolve_profile(
        &self,
        query: &str,
        period: &str,
    ) -> Result<Option<ResolvedProfile>, StorageError> {
        ProfileResolver::new(self, &self.resolver).resolve_query(query, period)
    }

    /// All-time profile for a free-text query.
    ///
    /// Tries the best candidate, then each remaining candidate in rank order.
    pub fn resolve_profile_all_time(
        &self,
        query: &str,
    ) -> Result<Option<ResolvedAllTime>, StorageError> {
        let candidates = self.candidates(query, None)?;
        for (rank, candidate) in candidates.iter().enumerate() {
            if let Some(profile) = self.profile_all_time(&candidate.name)? {
                return Ok(Some(ResolvedAllTime {
                    requested_name: candidates[0].name.clone(),
                    profile,
                    substituted: rank > 0,
                }));
            }
        }
        Ok(None)
    }
}

impl RecordLookup for QueryService {
    fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError> {
        QueryService::list_names(self, period)
    }

    fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError> {
        QueryService::profile(self, name, period)
    }

    fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError> {
        QueryService::latest_period_for_name(self, name)
    }
}
