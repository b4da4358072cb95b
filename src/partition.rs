//! Series partitioning (Arrow record batches)
//!
//! Every distinct series key is assigned to one of `n_partitions` buckets,
//! round-robin over the order in which keys first appear:
//!
//! ```text
//! rows:     A A B C B D C D
//! ordinal:  0 0 1 2 1 3 2 3
//! p=2:      0 0 1 0 1 1 0 1
//! ```
//!
//! Toyota Way Principles:
//! - Heijunka (Load Leveling): series counts per partition differ by at most one
//! - Poka-Yoke: a series is never split across partitions
//!
//! The assignment balances series, not rows. It is deterministic for a given
//! row order and never hashes key values, so the same table always lands in
//! the same partitions.

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, UInt32Array, UInt64Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use arrow::row::{Row, RowConverter, Rows, SortField};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the auxiliary column added by [`add_partition_key`]
pub const PARTITION_KEY_COLUMN: &str = "partition_key";

/// Rows of a single partition, ready to be fitted
#[derive(Debug, Clone)]
pub struct Partition {
    /// Partition id in `[0, n_partitions)`
    pub id: u32,
    /// Partition rows in original order, without the auxiliary column
    pub data: RecordBatch,
}

impl Partition {
    /// Number of rows in this partition
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }
}

/// Add a `partition_key` column that balances series across `n_partitions`
///
/// The i-th distinct series key (in first-seen order) is assigned to
/// partition `i % n_partitions`. All rows of a series share one partition id.
///
/// # Arguments
/// * `batch` - Long-format data, one row per (series, timestamp)
/// * `series_keys` - Columns identifying unique time series
/// * `n_partitions` - Number of partitions (one per worker)
///
/// # Returns
/// A new batch with the input columns unchanged, in the same row order, plus a
/// trailing non-nullable `UInt32` column named [`PARTITION_KEY_COLUMN`]
///
/// # Errors
/// Returns error if:
/// - `n_partitions` is zero
/// - `series_keys` is empty or names a missing column
/// - `batch` already has a `partition_key` column
/// - a key column type cannot be encoded by the Arrow row format
///
/// # Example
///
/// ```rust
/// use paraselect::partition::{add_partition_key, PARTITION_KEY_COLUMN};
/// use arrow::array::{Float64Array, RecordBatch, StringArray};
/// use arrow::datatypes::{DataType, Field, Schema};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Arc::new(Schema::new(vec![
///     Field::new("store", DataType::Utf8, false),
///     Field::new("sales", DataType::Float64, false),
/// ]));
/// let batch = RecordBatch::try_new(
///     schema,
///     vec![
///         Arc::new(StringArray::from(vec!["A", "B", "A", "C"])),
///         Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])),
///     ],
/// )?;
///
/// let tagged = add_partition_key(&batch, &["store"], 2)?;
/// assert_eq!(tagged.num_columns(), 3);
/// assert!(tagged.schema().column_with_name(PARTITION_KEY_COLUMN).is_some());
/// # Ok(())
/// # }
/// ```
pub fn add_partition_key<K: AsRef<str>>(
    batch: &RecordBatch,
    series_keys: &[K],
    n_partitions: usize,
) -> Result<RecordBatch> {
    if n_partitions == 0 {
        return Err(Error::InvalidInput(
            "n_partitions must be > 0".to_string(),
        ));
    }

    let schema = batch.schema();
    if schema.column_with_name(PARTITION_KEY_COLUMN).is_some() {
        return Err(Error::InvalidInput(format!(
            "batch already has a `{PARTITION_KEY_COLUMN}` column"
        )));
    }

    let indices = key_indices(&schema, series_keys)?;
    let rows = encode_series_keys(batch, &indices)?;
    let ordinals = enumerate_series(&rows);

    let ids = ordinals
        .per_row
        .iter()
        .map(|&ordinal| partition_id(ordinal, n_partitions))
        .collect::<Result<Vec<u32>>>()?;

    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(
        PARTITION_KEY_COLUMN,
        DataType::UInt32,
        false,
    )));
    let tagged_schema = Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    ));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(UInt32Array::from(ids)));

    Ok(RecordBatch::try_new(tagged_schema, columns)?)
}

/// Distinct series keys in first-seen order
///
/// Returns the key columns only, one row per distinct series. Row `i` of the
/// result is the series that [`add_partition_key`] assigns to
/// partition `i % n_partitions`.
///
/// # Errors
/// Returns error if `series_keys` is empty, names a missing column, or a key
/// column type cannot be encoded by the Arrow row format
pub fn distinct_series<K: AsRef<str>>(
    batch: &RecordBatch,
    series_keys: &[K],
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = key_indices(&schema, series_keys)?;
    let rows = encode_series_keys(batch, &indices)?;
    let ordinals = enumerate_series(&rows);

    let keys = batch.project(&indices)?;
    Ok(take_record_batch(
        &keys,
        &UInt64Array::from(ordinals.first_rows),
    )?)
}

/// Remove the auxiliary `partition_key` column
///
/// Returns the batch unchanged when the column is absent.
///
/// # Errors
/// Returns error if the projected batch cannot be built
pub fn drop_partition_key(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let Some((index, _)) = schema.column_with_name(PARTITION_KEY_COLUMN) else {
        return Ok(batch.clone());
    };

    let keep: Vec<usize> = (0..batch.num_columns()).filter(|&i| i != index).collect();
    Ok(batch.project(&keep)?)
}

/// Split a tagged batch into one sub-table per non-empty partition
///
/// Partitions come out in ascending id order, rows within a partition keep
/// their original order, and the auxiliary column is removed from each
/// sub-table. Ids with no rows produce no [`Partition`].
///
/// # Errors
/// Returns error if the batch has no `partition_key` column, the column is
/// not a non-null `UInt32` column, or a sub-table cannot be gathered
pub fn split_partitions(batch: &RecordBatch) -> Result<Vec<Partition>> {
    let schema = batch.schema();
    let (index, _) = schema
        .column_with_name(PARTITION_KEY_COLUMN)
        .ok_or_else(|| Error::ColumnNotFound(PARTITION_KEY_COLUMN.to_string()))?;

    let ids = batch
        .column(index)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| {
            Error::InvalidInput(format!("`{PARTITION_KEY_COLUMN}` must be a UInt32 column"))
        })?;
    if ids.null_count() > 0 {
        return Err(Error::InvalidInput(format!(
            "`{PARTITION_KEY_COLUMN}` must not contain nulls"
        )));
    }

    let mut groups: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    for (row, &id) in ids.values().iter().enumerate() {
        groups.entry(id).or_default().push(row as u64);
    }

    let untagged = drop_partition_key(batch)?;
    groups
        .into_iter()
        .map(|(id, rows)| {
            let data = take_record_batch(&untagged, &UInt64Array::from(rows))?;
            Ok(Partition { id, data })
        })
        .collect()
}

/// Resolve key column names to indices
fn key_indices<K: AsRef<str>>(schema: &Schema, series_keys: &[K]) -> Result<Vec<usize>> {
    if series_keys.is_empty() {
        return Err(Error::InvalidInput(
            "series_keys must not be empty".to_string(),
        ));
    }

    series_keys
        .iter()
        .map(|name| {
            let name = name.as_ref();
            schema
                .column_with_name(name)
                .map(|(index, _)| index)
                .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
        })
        .collect()
}

/// Encode the key columns into comparable rows (nulls compare equal)
fn encode_series_keys(batch: &RecordBatch, indices: &[usize]) -> Result<Rows> {
    let schema = batch.schema();
    let fields = indices
        .iter()
        .map(|&i| SortField::new(schema.field(i).data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;

    let columns: Vec<ArrayRef> = indices
        .iter()
        .map(|&i| Arc::clone(batch.column(i)))
        .collect();
    Ok(converter.convert_columns(&columns)?)
}

/// First-seen enumeration of series keys
struct SeriesOrdinals {
    /// Ordinal of each row's series key
    per_row: Vec<usize>,
    /// Row index where each series first appears, indexed by ordinal
    first_rows: Vec<u64>,
}

fn enumerate_series(rows: &Rows) -> SeriesOrdinals {
    let mut seen: FxHashMap<Row<'_>, usize> = FxHashMap::default();
    let mut per_row = Vec::with_capacity(rows.num_rows());
    let mut first_rows = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let next = seen.len();
        let ordinal = *seen.entry(row).or_insert_with(|| {
            first_rows.push(index as u64);
            next
        });
        per_row.push(ordinal);
    }

    SeriesOrdinals {
        per_row,
        first_rows,
    }
}

fn partition_id(ordinal: usize, n_partitions: usize) -> Result<u32> {
    u32::try_from(ordinal % n_partitions).map_err(|_| {
        Error::InvalidInput(format!(
            "n_partitions ({n_partitions}) exceeds the UInt32 partition id range"
        ))
    })
}
