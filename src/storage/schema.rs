//! Snapshot table schema and its one repair step.
//!
//! Tables written by early versions stored `period` as an integer (`202501`). Repair
//! is split into shape detection, a pure batch transform, and an atomic file swap
//! done by the store.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use super::StorageError;
use crate::models::MOVE_SLOTS;

pub const NAME: &str = "name";
pub const PERIOD: &str = "period";
pub const USAGE_FRACTION: &str = "usage_fraction";
pub const RAW_COUNT: &str = "raw_count";
pub const TOP_ABILITY: &str = "top_ability";
pub const TOP_ITEM: &str = "top_item";
pub const ITEM_FRACTION: &str = "item_fraction";
pub const TOP_TERA_TYPE: &str = "top_tera_type";
pub const TERA_FRACTION: &str = "tera_fraction";
pub const TOP_SPREAD: &str = "top_spread";
pub const TOP_SPREAD_WITHOUT_NATURE: &str = "top_spread_without_nature";
pub const TOP_NATURE: &str = "top_nature";

/// Column holding the name of move slot `slot` (0-based).
pub fn move_column(slot: usize) -> String {
    format!("move{}", slot + 1)
}

/// Column holding the fraction of move slot `slot` (0-based).
pub fn move_fraction_column(slot: usize) -> String {
    format!("move{}_fraction", slot + 1)
}

/// The current table schema.
pub fn usage_schema() -> Schema {
    let mut fields = vec![
        Field::new(NAME, DataType::Utf8, false),
        Field::new(PERIOD, DataType::Utf8, false),
        Field::new(USAGE_FRACTION, DataType::Float64, true),
        Field::new(RAW_COUNT, DataType::Float64, true),
        Field::new(TOP_ABILITY, DataType::Utf8, true),
        Field::new(TOP_ITEM, DataType::Utf8, true),
        Field::new(ITEM_FRACTION, DataType::Float64, true),
        Field::new(TOP_TERA_TYPE, DataType::Utf8, true),
        Field::new(TERA_FRACTION, DataType::Float64, true),
        Field::new(TOP_SPREAD, DataType::Utf8, true),
        Field::new(TOP_SPREAD_WITHOUT_NATURE, DataType::Utf8, true),
        Field::new(TOP_NATURE, DataType::Utf8, true),
    ];
    for slot in 0..MOVE_SLOTS {
        fields.push(Field::new(move_column(slot), DataType::Utf8, true));
        fields.push(Field::new(move_fraction_column(slot), DataType::Float64, true));
    }
    Schema::new(fields)
}

/// What an existing table file looks like.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaShape {
    /// `period` is already text
    Current,
    /// `period` was stored with a non-text type and needs repair
    LegacyPeriod(DataType),
}

impl SchemaShape {
    pub fn needs_repair(&self) -> bool {
        !matches!(self, SchemaShape::Current)
    }
}

/// Classify a stored schema.
pub fn detect_shape(schema: &Schema) -> Result<SchemaShape, StorageError> {
    let period = schema
        .field_with_name(PERIOD)
        .map_err(|_| StorageError::Schema(format!("missing column '{}'", PERIOD)))?;
    if schema.field_with_name(NAME).is_err() {
        return Err(StorageError::Schema(format!("missing column '{}'", NAME)));
    }

    Ok(match period.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => SchemaShape::Current,
        other => SchemaShape::LegacyPeriod(other.clone()),
    })
}

/// Rewrite one batch with `period` cast to text. Every other column is kept as is.
pub fn migrate_batch(batch: &RecordBatch) -> Result<RecordBatch, StorageError> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if field.name() == PERIOD {
            columns.push(cast(column, &DataType::Utf8)?);
            fields.push(Field::new(PERIOD, DataType::Utf8, field.is_nullable()));
        } else {
            columns.push(column.clone());
            fields.push(field.as_ref().clone());
        }
    }

    let migrated: SchemaRef = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(migrated, columns)?)
}
