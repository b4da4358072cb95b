//! Parallel model selection over many store/item series
//!
//! This example demonstrates:
//! - Implementing `Selector` for a moving-average window search
//! - Fitting on one worker and on several workers
//! - Scoring per series and per store (`scoring_keys`)
//!
//! Run with: cargo run --example parallel_selection --release
//! Verbose: PARASELECT_LOG=paraselect=debug cargo run --example parallel_selection

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use paraselect::logging::{init_logging, LoggingConfig};
use paraselect::{
    fit_selector_in_parallel, Error, FitOptions, ParallelFitConfig, ParallelFitter, Result,
    Selector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Picks, per scoring group, the moving-average window with the lowest
/// one-step-ahead mean absolute error
#[derive(Debug, Clone, Default)]
struct WindowSelector {
    candidates: Vec<usize>,
    best_scores: Option<RecordBatch>,
}

impl Selector for WindowSelector {
    type Params = Vec<usize>;

    fn with_params(&self, params: &Self::Params) -> Result<Self> {
        if params.iter().any(|&w| w == 0) {
            return Err(Error::InvalidInput("windows must be > 0".to_string()));
        }
        let candidates = if params.is_empty() {
            self.candidates.clone()
        } else {
            params.clone()
        };
        Ok(Self {
            candidates,
            best_scores: None,
        })
    }

    fn fit(&mut self, data: &RecordBatch, options: &FitOptions) -> Result<()> {
        let target = column::<Float64Array>(data, options.target())?;
        let series = options
            .series_keys()
            .iter()
            .map(|name| column::<StringArray>(data, name))
            .collect::<Result<Vec<_>>>()?;
        let scoring = options
            .scoring_keys()
            .iter()
            .map(|name| column::<StringArray>(data, name))
            .collect::<Result<Vec<_>>>()?;

        // Per-series history, and which scoring group each series belongs to
        let mut histories: HashMap<Vec<&str>, Vec<f64>> = HashMap::new();
        let mut group_of: HashMap<Vec<&str>, Vec<&str>> = HashMap::new();
        let mut group_order: Vec<Vec<&str>> = Vec::new();
        for row in 0..data.num_rows() {
            let key: Vec<&str> = series.iter().map(|c| c.value(row)).collect();
            let group: Vec<&str> = scoring.iter().map(|c| c.value(row)).collect();
            if !group_order.contains(&group) {
                group_order.push(group.clone());
            }
            group_of.entry(key.clone()).or_insert(group);
            histories.entry(key).or_default().push(target.value(row));
        }

        let mut key_values: Vec<Vec<String>> = vec![Vec::new(); scoring.len()];
        let mut best_windows = Vec::with_capacity(group_order.len());
        let mut best_errors = Vec::with_capacity(group_order.len());
        for group in &group_order {
            let members: Vec<&Vec<f64>> = histories
                .iter()
                .filter(|(key, _)| group_of.get(*key) == Some(group))
                .map(|(_, history)| history)
                .collect();

            let (window, error) = self
                .candidates
                .iter()
                .map(|&window| {
                    let total: f64 = members.iter().map(|h| moving_average_mae(h, window)).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let mean = total / members.len() as f64;
                    (window, mean)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .ok_or_else(|| Error::Fit("no candidate windows".to_string()))?;

            for (values, value) in key_values.iter_mut().zip(group) {
                values.push((*value).to_string());
            }
            best_windows.push(window as u64);
            best_errors.push(error);
        }

        let mut fields: Vec<Field> = options
            .scoring_keys()
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, false))
            .collect();
        fields.push(Field::new("best_window", DataType::UInt64, false));
        fields.push(Field::new("mae", DataType::Float64, false));

        let mut columns: Vec<ArrayRef> = key_values
            .into_iter()
            .map(|values| Arc::new(StringArray::from(values)) as ArrayRef)
            .collect();
        columns.push(Arc::new(UInt64Array::from(best_windows)));
        columns.push(Arc::new(Float64Array::from(best_errors)));

        self.best_scores = Some(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?);
        Ok(())
    }

    fn best_scores(&self) -> Option<&RecordBatch> {
        self.best_scores.as_ref()
    }

    fn set_best_scores(&mut self, scores: RecordBatch) {
        self.best_scores = Some(scores);
    }
}

fn column<'a, A: Array + 'static>(data: &'a RecordBatch, name: &str) -> Result<&'a A> {
    let (index, _) = data
        .schema()
        .column_with_name(name)
        .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
    data.column(index)
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| Error::Fit(format!("column `{name}` has an unexpected type")))
}

/// One-step-ahead MAE of a trailing moving average
#[allow(clippy::cast_precision_loss)]
fn moving_average_mae(history: &[f64], window: usize) -> f64 {
    if history.len() <= window {
        return f64::INFINITY;
    }
    let errors: Vec<f64> = (window..history.len())
        .map(|t| {
            let forecast = history[t - window..t].iter().sum::<f64>() / window as f64;
            (history[t] - forecast).abs()
        })
        .collect();
    errors.iter().sum::<f64>() / errors.len() as f64
}

/// Daily sales for `stores * items` series, rows interleaved by day
fn create_sales_batch(stores: usize, items: usize, days: usize) -> Result<RecordBatch> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut store_col = Vec::with_capacity(stores * items * days);
    let mut item_col = Vec::with_capacity(stores * items * days);
    let mut sales_col = Vec::with_capacity(stores * items * days);

    for day in 0..days {
        for store in 0..stores {
            for item in 0..items {
                #[allow(clippy::cast_precision_loss)]
                let level = 50.0 + (store * 10 + item) as f64;
                #[allow(clippy::cast_precision_loss)]
                let weekly = 10.0 * ((day % 7) as f64 / 7.0 * std::f64::consts::TAU).sin();
                store_col.push(format!("store_{store:02}"));
                item_col.push(format!("item_{item:02}"));
                sales_col.push(level + weekly + rng.gen_range(-5.0..5.0));
            }
        }
    }

    let schema = Schema::new(vec![
        Field::new("store", DataType::Utf8, false),
        Field::new("item", DataType::Utf8, false),
        Field::new("sales", DataType::Float64, false),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(store_col)),
            Arc::new(StringArray::from(item_col)),
            Arc::new(Float64Array::from(sales_col)),
        ],
    )?)
}

fn print_scores(scores: &RecordBatch, limit: usize) {
    let names: Vec<String> = scores
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    println!("  {}", names.join(" | "));
    for row in 0..scores.num_rows().min(limit) {
        let cells: Vec<String> = scores
            .columns()
            .iter()
            .map(|column| {
                if let Some(s) = column.as_any().downcast_ref::<StringArray>() {
                    s.value(row).to_string()
                } else if let Some(u) = column.as_any().downcast_ref::<UInt64Array>() {
                    u.value(row).to_string()
                } else if let Some(f) = column.as_any().downcast_ref::<Float64Array>() {
                    format!("{:.3}", f.value(row))
                } else {
                    "?".to_string()
                }
            })
            .collect();
        println!("  {}", cells.join(" | "));
    }
    if scores.num_rows() > limit {
        println!("  ... {} more rows", scores.num_rows() - limit);
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(&LoggingConfig::from_env())?;

    println!("=== Paraselect Parallel Selection Example ===\n");

    println!("Creating sample dataset (40 stores x 25 items x 365 days)...");
    let batch = create_sales_batch(40, 25, 365)?;
    println!("  ✓ Created batch: {} rows, {} columns\n", batch.num_rows(), batch.num_columns());

    let template = WindowSelector::default();
    let windows = vec![1, 3, 7, 14, 28];

    // Baseline: one worker, whole table in one job
    println!("Fitting on 1 worker...");
    let start = Instant::now();
    let single = fit_selector_in_parallel(
        &template,
        &windows,
        &batch,
        "sales",
        &["store", "item"],
        None,
        1,
    )?;
    println!("  ✓ Fitted in {:?}\n", start.elapsed());

    // Worker count from PARASELECT_WORKERS, at least 4 for the demo
    let mut config = ParallelFitConfig::from_env();
    config.n_workers = config.n_workers.max(4);
    println!("Fitting on {} workers...", config.n_workers);
    let fitter = ParallelFitter::from_config(config)?;
    let start = Instant::now();
    let parallel = fitter.fit(&template, &windows, &batch, "sales", &["store", "item"])?;
    println!("  ✓ Fitted in {:?}", start.elapsed());

    let single_rows = single.best_scores().map_or(0, RecordBatch::num_rows);
    let parallel_rows = parallel.best_scores().map_or(0, RecordBatch::num_rows);
    println!("  ✓ Score rows: {parallel_rows} (single worker: {single_rows})\n");

    if let Some(scores) = parallel.best_scores() {
        println!("Per-series scores (partition order):");
        print_scores(scores, 8);
        println!();
    }

    // One window per store, chosen across that store's items
    println!("Scoring per store...");
    let per_store = ParallelFitter::builder()
        .n_workers(4)
        .scoring_keys(["store"])
        .build()?
        .fit(&template, &windows, &batch, "sales", &["store", "item"])?;
    if let Some(scores) = per_store.best_scores() {
        println!("  Note: a store whose items span partitions is scored once per partition");
        print_scores(scores, 8);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
