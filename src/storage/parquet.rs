//! Parquet encoding of the snapshot table.
//!
//! Records are converted to one Arrow record batch per write. Files are always
//! written next to their destination and renamed into place, so a reader never sees
//! a partially written table.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, warn};

use super::schema::{self, usage_schema};
use super::StorageError;
use crate::models::{MoveSlot, UsageRecord, MOVE_SLOTS};

/// Build a record batch in the current schema.
pub fn encode_records(records: &[UsageRecord]) -> Result<RecordBatch, StorageError> {
    let schema = Arc::new(usage_schema());

    let text = |f: &dyn Fn(&UsageRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };
    let number = |f: &dyn Fn(&UsageRecord) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(records.iter().map(f).collect::<Vec<_>>()))
    };

    let mut columns: Vec<ArrayRef> = vec![
        text(&|r| Some(r.name.as_str())),
        text(&|r| Some(r.period.as_str())),
        number(&|r| r.usage_fraction),
        number(&|r| r.raw_count),
        text(&|r| r.top_ability.as_deref()),
        text(&|r| r.top_item.as_deref()),
        number(&|r| r.item_fraction),
        text(&|r| r.top_tera_type.as_deref()),
        number(&|r| r.tera_fraction),
        text(&|r| r.top_spread.as_deref()),
        text(&|r| r.top_spread_without_nature.as_deref()),
        text(&|r| r.top_nature.as_deref()),
    ];
    for slot in 0..MOVE_SLOTS {
        columns.push(text(&|r| r.moves[slot].name.as_deref()));
        columns.push(number(&|r| r.moves[slot].fraction));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Decode a batch by column name.
///
/// Columns are cast to the expected type first, so older files with other numeric
/// or text encodings still read. Missing optional columns decode as null.
pub fn decode_batch(batch: &RecordBatch) -> Result<Vec<UsageRecord>, StorageError> {
    let names = required_text(batch, schema::NAME)?;
    let periods = required_text(batch, schema::PERIOD)?;
    let usage = optional_number(batch, schema::USAGE_FRACTION)?;
    let raw_count = optional_number(batch, schema::RAW_COUNT)?;
    let top_ability = optional_text(batch, schema::TOP_ABILITY)?;
    let top_item = optional_text(batch, schema::TOP_ITEM)?;
    let item_fraction = optional_number(batch, schema::ITEM_FRACTION)?;
    let top_tera_type = optional_text(batch, schema::TOP_TERA_TYPE)?;
    let tera_fraction = optional_number(batch, schema::TERA_FRACTION)?;
    let top_spread = optional_text(batch, schema::TOP_SPREAD)?;
    let top_spread_wo = optional_text(batch, schema::TOP_SPREAD_WITHOUT_NATURE)?;
    let top_nature = optional_text(batch, schema::TOP_NATURE)?;

    let mut move_names = Vec::with_capacity(MOVE_SLOTS);
    let mut move_fractions = Vec::with_capacity(MOVE_SLOTS);
    for slot in 0..MOVE_SLOTS {
        move_names.push(optional_text(batch, &schema::move_column(slot))?);
        move_fractions.push(optional_number(batch, &schema::move_fraction_column(slot))?);
    }

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if names.is_null(row) || periods.is_null(row) {
            return Err(StorageError::Schema(format!("row {} has a null key", row)));
        }

        let mut record = UsageRecord::new(names.value(row), periods.value(row));
        record.usage_fraction = number_at(usage.as_ref(), row);
        record.raw_count = number_at(raw_count.as_ref(), row);
        record.top_ability = text_at(top_ability.as_ref(), row);
        record.top_item = text_at(top_item.as_ref(), row);
        record.item_fraction = number_at(item_fraction.as_ref(), row);
        record.top_tera_type = text_at(top_tera_type.as_ref(), row);
        record.tera_fraction = number_at(tera_fraction.as_ref(), row);
        record.top_spread = text_at(top_spread.as_ref(), row);
        record.top_spread_without_nature = text_at(top_spread_wo.as_ref(), row);
        record.top_nature = text_at(top_nature.as_ref(), row);
        for slot in 0..MOVE_SLOTS {
            record.moves[slot] = MoveSlot::new(
                text_at(move_names[slot].as_ref(), row),
                number_at(move_fractions[slot].as_ref(), row),
            );
        }
        records.push(record);
    }

    Ok(records)
}

fn column_as(
    batch: &RecordBatch,
    name: &str,
    data_type: &DataType,
) -> Result<Option<ArrayRef>, StorageError> {
    match batch.column_by_name(name) {
        Some(column) if column.data_type() == data_type => Ok(Some(column.clone())),
        Some(column) => Ok(Some(cast(column, data_type)?)),
        None => Ok(None),
    }
}

fn optional_text(batch: &RecordBatch, name: &str) -> Result<Option<StringArray>, StorageError> {
    Ok(column_as(batch, name, &DataType::Utf8)?.map(|c| StringArray::from(c.to_data())))
}

fn optional_number(
    batch: &RecordBatch,
    name: &str,
) -> Result<Option<Float64Array>, StorageError> {
    Ok(column_as(batch, name, &DataType::Float64)?.map(|c| Float64Array::from(c.to_data())))
}

fn required_text(batch: &RecordBatch, name: &str) -> Result<StringArray, StorageError> {
    optional_text(batch, name)?
        .ok_or_else(|| StorageError::Schema(format!("missing column '{}'", name)))
}

fn text_at(column: Option<&StringArray>, row: usize) -> Option<String> {
    column
        .filter(|c| !c.is_null(row))
        .map(|c| c.value(row).to_string())
}

fn number_at(column: Option<&Float64Array>, row: usize) -> Option<f64> {
    column.filter(|c| !c.is_null(row)).map(|c| c.value(row))
}

/// Read the schema of a table file without decoding rows.
pub fn read_schema(path: &Path) -> Result<SchemaRef, StorageError> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    Ok(builder.schema().clone())
}

/// Read all record batches from a file. A missing file reads as empty.
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    debug!("Read {} batches from {:?}", batches.len(), path);
    Ok(batches)
}

/// Read and decode every record in a file.
pub fn read_records(path: &Path) -> Result<Vec<UsageRecord>, StorageError> {
    let mut records = Vec::new();
    for batch in read_batches(path)? {
        records.extend(decode_batch(&batch)?);
    }
    Ok(records)
}

/// Sibling path used while a file is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write batches to a temp file next to `path`, then rename over `path`.
///
/// On failure the temp file is removed and `path` is left as it was.
pub fn write_batches_atomic(
    path: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let written = write_file(&tmp, schema, batches)
        .and_then(|()| fs::rename(&tmp, path).map_err(StorageError::from));
    if let Err(e) = written {
        if tmp.exists() {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!("Failed to remove {:?}: {}", tmp, cleanup);
            }
        }
        return Err(e);
    }

    debug!("Wrote {} batches to {:?}", batches.len(), path);
    Ok(())
}

fn write_file(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<(), StorageError> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Encode and atomically write records in the current schema.
pub fn write_records(path: &Path, records: &[UsageRecord]) -> Result<(), StorageError> {
    let batch = encode_records(records)?;
    write_batches_atomic(path, batch.schema(), &[batch])
}

/// Write a table with no rows.
pub fn write_empty(path: &Path) -> Result<(), StorageError> {
    let schema: SchemaRef = Arc::new(usage_schema());
    let batch = RecordBatch::new_empty(schema.clone());
    write_batches_atomic(path, schema, &[batch])
}
