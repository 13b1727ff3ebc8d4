//! Result cache for the query service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::aggregate::MetaDimension;
use crate::models::{AggregatedProfile, LabelCount, UsageRecord};

/// A query and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Periods,
    Names(Option<String>),
    TopN { period: String, n: usize },
    TopNAllTime(usize),
    Profile { name: String, period: String },
    ProfileAllTime(String),
    TopValues {
        dimension: MetaDimension,
        period: Option<String>,
        k: usize,
    },
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Strings(Vec<String>),
    Records(Vec<UsageRecord>),
    Record(Option<UsageRecord>),
    Profiles(Vec<AggregatedProfile>),
    Profile(Option<AggregatedProfile>),
    Labels(Vec<LabelCount>),
}

/// Conversion between a query result and its cached form.
pub trait Cacheable: Sized {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(Vec<String>, Strings);
cacheable!(Vec<UsageRecord>, Records);
cacheable!(Option<UsageRecord>, Record);
cacheable!(Vec<AggregatedProfile>, Profiles);
cacheable!(Option<AggregatedProfile>, Profile);
cacheable!(Vec<LabelCount>, Labels);

/// Thread-safe map from query to result. Cleared only by the owner.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<CacheKey, CachedValue>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedValue>> {
        // A panic while holding the lock leaves the map usable
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        self.lock().get(key).cloned().and_then(T::from_cached)
    }

    pub fn insert<T: Cacheable + Clone>(&self, key: CacheKey, value: &T) {
        self.lock().insert(key, value.clone().into_cached());
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
