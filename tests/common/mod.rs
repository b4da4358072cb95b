//! Shared fixtures: a mean-baseline selector and long-format batch builders

#![allow(dead_code)]

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use paraselect::{Error, FitOptions, Result, Selector};
use std::collections::HashMap;
use std::sync::Arc;

/// Initialization parameters of [`MeanBaselineSelector`]
#[derive(Debug, Clone, Default)]
pub struct MeanParams {
    /// Average only the last `window` rows of each group
    pub window: Option<usize>,
    /// Fail when this series is present in the fitted data
    pub fail_on_series: Option<String>,
}

/// Scores every scoring group by the mean of its target
///
/// Scoring table columns: the scoring keys (Utf8), `n_rows` (UInt64),
/// `mean` (Float64). Groups appear in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MeanBaselineSelector {
    pub window: Option<usize>,
    pub fail_on_series: Option<String>,
    /// Rows seen by the last fit (non-score state)
    pub fitted_rows: usize,
    pub best_scores: Option<RecordBatch>,
}

impl Selector for MeanBaselineSelector {
    type Params = MeanParams;

    fn with_params(&self, params: &MeanParams) -> Result<Self> {
        if params.window == Some(0) {
            return Err(Error::InvalidInput("window must be > 0".to_string()));
        }
        Ok(Self {
            window: params.window.or(self.window),
            fail_on_series: params
                .fail_on_series
                .clone()
                .or_else(|| self.fail_on_series.clone()),
            fitted_rows: 0,
            best_scores: None,
        })
    }

    fn fit(&mut self, data: &RecordBatch, options: &FitOptions) -> Result<()> {
        let target = float_column(data, options.target())?;
        let series = string_columns(data, options.series_keys())?;
        let scoring = string_columns(data, options.scoring_keys())?;

        if let Some(bad) = &self.fail_on_series {
            for row in 0..data.num_rows() {
                if series.iter().any(|column| column.value(row) == bad.as_str()) {
                    return Err(Error::Fit(format!("series {bad} cannot be fitted")));
                }
            }
        }

        let mut order: Vec<Vec<String>> = Vec::new();
        let mut groups: HashMap<Vec<String>, Vec<f64>> = HashMap::new();
        for row in 0..data.num_rows() {
            let key: Vec<String> = scoring
                .iter()
                .map(|column| column.value(row).to_string())
                .collect();
            let values = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            values.push(target.value(row));
        }

        let mut key_values: Vec<Vec<String>> = vec![Vec::new(); scoring.len()];
        let mut n_rows = Vec::with_capacity(order.len());
        let mut means = Vec::with_capacity(order.len());
        for key in &order {
            let values = &groups[key];
            let used = match self.window {
                Some(window) if window < values.len() => &values[values.len() - window..],
                _ => &values[..],
            };
            for (column, value) in key_values.iter_mut().zip(key) {
                column.push(value.clone());
            }
            n_rows.push(used.len() as u64);
            means.push(used.iter().sum::<f64>() / used.len() as f64);
        }

        let mut fields: Vec<Field> = options
            .scoring_keys()
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, false))
            .collect();
        fields.push(Field::new("n_rows", DataType::UInt64, false));
        fields.push(Field::new("mean", DataType::Float64, false));

        let mut columns: Vec<ArrayRef> = key_values
            .into_iter()
            .map(|values| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect();
        columns.push(Arc::new(UInt64Array::from(n_rows)));
        columns.push(Arc::new(Float64Array::from(means)));

        self.best_scores = Some(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?);
        self.fitted_rows = data.num_rows();
        Ok(())
    }

    fn best_scores(&self) -> Option<&RecordBatch> {
        self.best_scores.as_ref()
    }

    fn set_best_scores(&mut self, scores: RecordBatch) {
        self.best_scores = Some(scores);
    }
}

fn float_column<'a>(data: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    let (index, _) = data
        .schema()
        .column_with_name(name)
        .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
    data.column(index)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Fit(format!("target `{name}` must be Float64")))
}

fn string_columns<'a>(data: &'a RecordBatch, names: &[String]) -> Result<Vec<&'a StringArray>> {
    names
        .iter()
        .map(|name| {
            let (index, _) = data
                .schema()
                .column_with_name(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
            data.column(index)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::Fit(format!("key `{name}` must be Utf8")))
        })
        .collect()
}

/// Long-format batch with `series` (Utf8) and `target` (Float64) columns
pub fn series_batch(rows: &[(&str, f64)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("series", DataType::Utf8, false),
        Field::new("target", DataType::Float64, false),
    ]);

    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|(s, _)| *s))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|(_, t)| *t))),
        ],
    )
    .unwrap()
}

/// Four series `A..D`, two rows each, grouped by series
pub fn abcd_batch() -> RecordBatch {
    series_batch(&[
        ("A", 1.0),
        ("A", 3.0),
        ("B", 10.0),
        ("B", 20.0),
        ("C", 5.0),
        ("C", 7.0),
        ("D", 100.0),
        ("D", 300.0),
    ])
}

/// Store/item sales with a `region` grouping column
///
/// Columns: `region`, `store`, `item` (Utf8), `sales` (Float64)
pub fn retail_batch() -> RecordBatch {
    let rows = [
        ("north", "s1", "apples", 10.0),
        ("north", "s1", "pears", 4.0),
        ("south", "s2", "apples", 8.0),
        ("north", "s3", "apples", 12.0),
        ("south", "s4", "pears", 2.0),
        ("north", "s1", "apples", 14.0),
        ("north", "s1", "pears", 6.0),
        ("south", "s2", "apples", 6.0),
        ("north", "s3", "apples", 16.0),
        ("south", "s4", "pears", 4.0),
    ];

    let schema = Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("store", DataType::Utf8, false),
        Field::new("item", DataType::Utf8, false),
        Field::new("sales", DataType::Float64, false),
    ]);

    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.2))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.3))),
        ],
    )
    .unwrap()
}

/// Values of a Utf8 column
pub fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
    let (index, _) = batch.schema().column_with_name(name).unwrap();
    let array = batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    (0..array.len()).map(|i| array.value(i).to_string()).collect()
}

/// Values of a Float64 column
pub fn floats(batch: &RecordBatch, name: &str) -> Vec<f64> {
    let (index, _) = batch.schema().column_with_name(name).unwrap();
    batch
        .column(index)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap()
        .values()
        .to_vec()
}
