//! The persisted snapshot store.
//!
//! One Parquet file holds every period. Writes load the table, replace whole periods
//! and write the result back through a temp file and rename.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::parquet::{self as codec, temp_path};
use super::schema::{self, SchemaShape};
use super::{SnapshotTable, StorageConfig, StorageError};
use crate::aggregate::MetaDimension;
use crate::models::{AggregatedProfile, LabelCount, UsageRecord};
use crate::resolve::RecordLookup;

/// Modification time and size of the table file at one moment.
///
/// Every write replaces the file, so a differing stamp means the contents may have
/// changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// Owned handle to the snapshot table file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the primary table location of a data directory.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.table_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current stamp of the table file, or `None` if there is no file.
    pub fn stamp(&self) -> Option<FileStamp> {
        let meta = fs::metadata(&self.path).ok()?;
        Some(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    /// Create the table if missing, or repair a legacy `period` column.
    ///
    /// Repair rewrites the whole file to a shadow copy and renames it over the
    /// table file, so the table is never absent.
    pub fn ensure_schema(&self) -> Result<SchemaShape, StorageError> {
        if !self.path.exists() {
            codec::write_empty(&self.path)?;
            info!("Created snapshot table at {:?}", self.path);
            return Ok(SchemaShape::Current);
        }

        let current = codec::read_schema(&self.path)?;
        let shape = schema::detect_shape(&current)?;
        if let SchemaShape::LegacyPeriod(data_type) = &shape {
            warn!("Repairing period column stored as {:?} in {:?}", data_type, self.path);

            let batches = codec::read_batches(&self.path)?;
            let migrated = batches
                .iter()
                .map(schema::migrate_batch)
                .collect::<Result<Vec<_>, _>>()?;
            let rows: usize = migrated.iter().map(|b| b.num_rows()).sum();

            let target = match migrated.first() {
                Some(batch) => batch.schema(),
                None => Arc::new(schema::usage_schema()),
            };
            codec::write_batches_atomic(&self.path, target, &migrated)?;
            info!("Repaired snapshot table, {} rows preserved", rows);
        }

        Ok(shape)
    }

    /// Load every record.
    pub fn load(&self) -> Result<Vec<UsageRecord>, StorageError> {
        codec::read_records(&self.path)
    }

    /// Load the table for querying.
    pub fn table(&self) -> Result<SnapshotTable, StorageError> {
        Ok(SnapshotTable::new(self.load()?))
    }

    /// Replace every period present in `records` with the batch's rows.
    ///
    /// Periods not in the batch are untouched. Within the batch, a repeated
    /// `(name, period)` keeps its last occurrence. Returns the number of rows written
    /// for the batch's periods.
    pub fn upsert(&self, records: Vec<UsageRecord>) -> Result<usize, StorageError> {
        if records.is_empty() {
            debug!("Upsert called with no records");
            return Ok(0);
        }

        let mut incoming: BTreeMap<(String, String), UsageRecord> = BTreeMap::new();
        for record in records {
            incoming.insert((record.period.clone(), record.name.clone()), record);
        }
        let periods: BTreeSet<String> = incoming.keys().map(|(p, _)| p.clone()).collect();

        let mut rows = self.load()?;
        let before = rows.len();
        rows.retain(|r| !periods.contains(&r.period));
        let replaced = before - rows.len();

        let inserted = incoming.len();
        rows.extend(incoming.into_values());
        rows.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.name.cmp(&b.name)));

        codec::write_records(&self.path, &rows)?;

        info!(
            "Upserted {} rows for periods {:?} (replaced {})",
            inserted, periods, replaced
        );
        Ok(inserted)
    }

    /// Remove every row of a period. Returns the number of rows removed.
    pub fn delete_period(&self, period: &str) -> Result<usize, StorageError> {
        let mut rows = self.load()?;
        let before = rows.len();
        rows.retain(|r| r.period != period);
        let removed = before - rows.len();

        if removed > 0 {
            codec::write_records(&self.path, &rows)?;
            info!("Deleted {} rows for period {}", removed, period);
        }
        Ok(removed)
    }

    /// Copy the table to `dst` through a temp file and rename.
    pub fn publish_read_copy(&self, dst: &Path) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Err(StorageError::PathNotFound(self.path.clone()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(dst);
        fs::copy(&self.path, &tmp)?;
        fs::rename(&tmp, dst)?;

        info!("Published read copy to {:?}", dst);
        Ok(())
    }

    pub fn list_periods(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.table()?.list_periods())
    }

    pub fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError> {
        Ok(self.table()?.list_names(period))
    }

    pub fn top_n(&self, period: &str, n: usize) -> Result<Vec<UsageRecord>, StorageError> {
        Ok(self.table()?.top_n(period, n))
    }

    pub fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError> {
        Ok(self.table()?.profile(name, period))
    }

    pub fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.table()?.latest_period_for_name(name))
    }

    pub fn top_n_all_time(&self, n: usize) -> Result<Vec<AggregatedProfile>, StorageError> {
        Ok(self.table()?.top_n_all_time(n))
    }

    pub fn profile_all_time(&self, name: &str) -> Result<Option<AggregatedProfile>, StorageError> {
        Ok(self.table()?.profile_all_time(name))
    }

    pub fn top_value_counts(
        &self,
        dimension: MetaDimension,
        period: Option<&str>,
        k: usize,
    ) -> Result<Vec<LabelCount>, StorageError> {
        Ok(self.table()?.top_value_counts(dimension, period, k))
    }
}

impl RecordLookup for SnapshotStore {
    fn list_names(&self, period: Option<&str>) -> Result<Vec<String>, StorageError> {
        SnapshotStore::list_names(self, period)
    }

    fn profile(&self, name: &str, period: &str) -> Result<Option<UsageRecord>, StorageError> {
        SnapshotStore::profile(self, name, period)
    }

    fn latest_period_for_name(&self, name: &str) -> Result<Option<String>, StorageError> {
        SnapshotStore::latest_period_for_name(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{NameResolver, ProfileResolver};
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(name: &str, period: &str, usage: f64) -> UsageRecord {
        let mut r = UsageRecord::new(name, period);
        r.usage_fraction = Some(usage);
        r
    }

    fn store(temp_dir: &TempDir) -> SnapshotStore {
        SnapshotStore::from_config(&StorageConfig::new(temp_dir.path().to_path_buf()))
    }

    #[test]
    fn test_stamp_changes_with_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert_eq!(store.stamp(), None);

        store.upsert(vec![record("A", "2025-01", 0.5)]).unwrap();
        let first = store.stamp().unwrap();
        assert_eq!(store.stamp(), Some(first));

        store.upsert(vec![record("B", "2025-02", 0.4)]).unwrap();
        assert_ne!(store.stamp(), Some(first));
    }

    #[test]
    fn test_ensure_schema_creates_table() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        assert!(!store.exists());
        assert_eq!(store.ensure_schema().unwrap(), SchemaShape::Current);
        assert!(store.exists());
        assert!(store.load().unwrap().is_empty());

        // Second call is a no-op
        assert_eq!(store.ensure_schema().unwrap(), SchemaShape::Current);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.ensure_schema().unwrap();

        let batch = vec![
            record("Incineroar", "2025-01", 0.5),
            record("Rillaboom", "2025-01", 0.3),
        ];
        store.upsert(batch.clone()).unwrap();
        let first = store.load().unwrap();
        store.upsert(batch).unwrap();

        assert_eq!(store.load().unwrap(), first);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_whole_period() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store
            .upsert(vec![
                record("A", "2025-01", 0.1),
                record("B", "2025-01", 0.2),
                record("A", "2025-02", 0.3),
            ])
            .unwrap();
        store.upsert(vec![record("C", "2025-01", 0.4)]).unwrap();

        assert_eq!(store.list_names(Some("2025-01")).unwrap(), vec!["C"]);
        assert_eq!(store.list_names(Some("2025-02")).unwrap(), vec!["A"]);
    }

    #[test]
    fn test_upsert_collapses_duplicate_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let inserted = store
            .upsert(vec![
                record("Incineroar", "2025-01", 0.1),
                record("Incineroar", "2025-01", 0.5),
            ])
            .unwrap();

        assert_eq!(inserted, 1);
        let found = store.profile("Incineroar", "2025-01").unwrap().unwrap();
        assert_eq!(found.usage_fraction, Some(0.5));
    }

    #[test]
    fn test_delete_period() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .upsert(vec![record("A", "2025-01", 0.1), record("A", "2025-02", 0.2)])
            .unwrap();

        assert_eq!(store.delete_period("2025-01").unwrap(), 1);
        assert_eq!(store.delete_period("2025-01").unwrap(), 0);
        assert_eq!(store.list_periods().unwrap(), vec!["2025-02"]);
    }

    #[test]
    fn test_repairs_integer_period() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("period", DataType::Int64, false),
            Field::new("usage_fraction", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["Incineroar", "Rillaboom"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![202501, 202501])) as ArrayRef,
                Arc::new(Float64Array::from(vec![0.5, 0.3])) as ArrayRef,
            ],
        )
        .unwrap();
        codec::write_batches_atomic(store.path(), schema, &[batch]).unwrap();

        let shape = store.ensure_schema().unwrap();
        assert_eq!(shape, SchemaShape::LegacyPeriod(DataType::Int64));

        let repaired = schema::detect_shape(&codec::read_schema(store.path()).unwrap()).unwrap();
        assert_eq!(repaired, SchemaShape::Current);
        assert_eq!(store.list_periods().unwrap(), vec!["202501"]);
        assert_eq!(store.load().unwrap().len(), 2);
        assert!(!temp_path(store.path()).exists());
    }

    #[test]
    fn test_publish_read_copy() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let dst = temp_dir.path().join("read").join("usage_read.parquet");

        assert!(matches!(
            store.publish_read_copy(&dst),
            Err(StorageError::PathNotFound(_))
        ));

        store.upsert(vec![record("A", "2025-01", 0.1)]).unwrap();
        store.publish_read_copy(&dst).unwrap();

        let copy = SnapshotStore::new(&dst);
        assert_eq!(copy.load().unwrap(), store.load().unwrap());
    }

    #[test]
    fn test_profile_fallback_through_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .upsert(vec![
                record("Yveltal", "2025-01", 0.2),
                record("Incineroar", "2025-03", 0.5),
            ])
            .unwrap();

        let resolver = NameResolver::default();
        let profiles = ProfileResolver::new(&store, &resolver);
        let resolved = profiles.resolve("Yveltal", "2025-03", &[]).unwrap().unwrap();

        assert_eq!(resolved.period, "2025-01");
        assert!(resolved.substituted);
    }
}
