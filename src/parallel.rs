//! Parallel fit coordinator
//!
//! Splits a long-format batch into series-balanced partitions, fits one
//! independent selector per partition on a rayon pool, and merges the
//! per-partition scoring tables:
//!
//! ```text
//! batch ──> add_partition_key ──> split_partitions ──> [P0, P1, .., Pn]
//!                                                        │   │       │
//!                                              fit (pool, one job per partition)
//!                                                        │   │       │
//!                                                      [S0, S1, .., Sn]
//!                                                        │
//!                        S0 + concat(S0.scores, S1.scores, .., Sn.scores)
//! ```
//!
//! Only the scoring tables are merged. All other fitted state of the returned
//! selector comes from partition 0's instance; the remaining instances are
//! dropped.
//!
//! Toyota Way Principles:
//! - Heijunka (Load Leveling): one series-balanced partition per worker
//! - Jidoka: one failing partition stops the whole fit, no partial results

use crate::partition::{add_partition_key, split_partitions, Partition};
use crate::selector::{FitOptions, Selector};
use crate::{Error, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Environment variable read by [`ParallelFitConfig::from_env`]
pub const WORKERS_ENV: &str = "PARASELECT_WORKERS";

/// Configuration of a coordinated fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelFitConfig {
    /// Number of workers, which is also the number of partitions
    pub n_workers: usize,
    /// Scoring groups; `None` scores every series individually
    pub scoring_keys: Option<Vec<String>>,
}

impl Default for ParallelFitConfig {
    fn default() -> Self {
        Self {
            n_workers: 1,
            scoring_keys: None,
        }
    }
}

impl ParallelFitConfig {
    /// Defaults overridden by `PARASELECT_WORKERS`
    ///
    /// Missing, unparsable or zero values keep the default of one worker.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(WORKERS_ENV) {
            if let Ok(n_workers) = raw.trim().parse::<usize>() {
                if n_workers > 0 {
                    config.n_workers = n_workers;
                }
            }
        }
        config
    }
}

/// Coordinates partitioned fitting of a selector
///
/// # Example
///
/// ```rust,no_run
/// use paraselect::parallel::ParallelFitter;
/// # use paraselect::selector::{FitOptions, Selector};
/// # use arrow::record_batch::RecordBatch;
/// # struct MySelector;
/// # impl Selector for MySelector {
/// #     type Params = ();
/// #     fn with_params(&self, _: &()) -> paraselect::Result<Self> { Ok(MySelector) }
/// #     fn fit(&mut self, _: &RecordBatch, _: &FitOptions) -> paraselect::Result<()> { Ok(()) }
/// #     fn best_scores(&self) -> Option<&RecordBatch> { None }
/// #     fn set_best_scores(&mut self, _: RecordBatch) {}
/// # }
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let batch: RecordBatch = unimplemented!();
/// let fitter = ParallelFitter::builder()
///     .n_workers(4)
///     .scoring_keys(["store"])
///     .build()?;
///
/// let fitted = fitter.fit(&MySelector, &(), &batch, "sales", &["store", "item"])?;
/// println!("{} score rows", fitted.best_scores().map_or(0, RecordBatch::num_rows));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ParallelFitter {
    config: ParallelFitConfig,
}

impl ParallelFitter {
    /// Create a new fitter builder
    #[must_use]
    pub fn builder() -> ParallelFitterBuilder {
        ParallelFitterBuilder::default()
    }

    /// Create a fitter from an existing configuration
    ///
    /// # Errors
    ///
    /// Returns error if `n_workers` is zero
    pub fn from_config(config: ParallelFitConfig) -> Result<Self> {
        if config.n_workers == 0 {
            return Err(Error::InvalidInput("n_workers must be > 0".to_string()));
        }
        Ok(Self { config })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ParallelFitConfig {
        &self.config
    }

    /// Fit a new selector to `batch`, one partition per worker
    ///
    /// # Arguments
    /// * `template` - Instance whose type and configuration every partition copies
    /// * `params` - Initialization parameters applied to each copy
    /// * `batch` - Long-format data
    /// * `target` - Name of the target column
    /// * `series_keys` - Columns identifying unique time series
    ///
    /// # Returns
    /// Partition 0's fitted selector carrying the concatenated scoring tables
    /// of all partitions, in partition order
    ///
    /// # Errors
    /// Returns error if:
    /// - partitioning fails (missing key columns, empty key list)
    /// - `batch` has no rows
    /// - any partition's fit fails (the first error is returned unchanged)
    /// - a fitted selector has no scoring table
    /// - per-partition scoring tables have different schemas
    pub fn fit<S: Selector>(
        &self,
        template: &S,
        params: &S::Params,
        batch: &RecordBatch,
        target: &str,
        series_keys: &[&str],
    ) -> Result<S> {
        let scoring_keys: Option<Vec<&str>> = self
            .config
            .scoring_keys
            .as_ref()
            .map(|keys| keys.iter().map(String::as_str).collect());
        let options = FitOptions::new(target, series_keys, scoring_keys.as_deref());

        // The tagged batch is local: the auxiliary column never outlives this scope
        let partitions = {
            let tagged = add_partition_key(batch, series_keys, self.config.n_workers)?;
            split_partitions(&tagged)?
        };
        if partitions.is_empty() {
            return Err(Error::InvalidInput("no series to fit".to_string()));
        }

        for partition in &partitions {
            debug!(
                partition = partition.id,
                rows = partition.num_rows(),
                "partition prepared"
            );
        }

        let selectors = self.dispatch(template, params, &partitions, &options)?;
        let fitted = merge_scores(selectors)?;

        info!(
            partitions = partitions.len(),
            workers = self.config.n_workers,
            rows = batch.num_rows(),
            score_rows = fitted.best_scores().map_or(0, RecordBatch::num_rows),
            "parallel fit complete"
        );
        Ok(fitted)
    }

    /// Fit every partition, results in partition order
    fn dispatch<S: Selector>(
        &self,
        template: &S,
        params: &S::Params,
        partitions: &[Partition],
        options: &FitOptions,
    ) -> Result<Vec<S>> {
        if partitions.len() == 1 {
            debug!("single partition, fitting on the calling thread");
            return partitions
                .iter()
                .map(|partition| fit_partition(partition, template, params, options))
                .collect();
        }

        let threads = self.config.n_workers.min(partitions.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("paraselect-worker-{index}"))
            .build()
            .map_err(|e| Error::WorkerPool(format!("failed to build rayon thread pool: {e}")))?;

        debug!(
            jobs = partitions.len(),
            threads,
            "dispatching partition fits"
        );
        pool.install(|| {
            partitions
                .par_iter()
                .map(|partition| fit_partition(partition, template, params, options))
                .collect()
        })
    }
}

/// Builder for [`ParallelFitter`]
#[derive(Debug, Default)]
pub struct ParallelFitterBuilder {
    config: ParallelFitConfig,
}

impl ParallelFitterBuilder {
    /// Set the number of workers (and partitions)
    #[must_use]
    pub fn n_workers(mut self, n_workers: usize) -> Self {
        self.config.n_workers = n_workers;
        self
    }

    /// Score groups instead of individual series
    #[must_use]
    pub fn scoring_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.config.scoring_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: ParallelFitConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the fitter
    ///
    /// # Errors
    ///
    /// Returns error if `n_workers` is zero
    pub fn build(self) -> Result<ParallelFitter> {
        ParallelFitter::from_config(self.config)
    }
}

/// Create a selector like `template`, configure it with `params` and fit it
///
/// This is the unit of parallel work: it only reads its inputs, so identical
/// calls can run concurrently against disjoint data.
///
/// # Errors
/// Returns error if the selector rejects `params` or its fit fails
pub fn fit_selector_to_one_partition<S: Selector>(
    data: &RecordBatch,
    template: &S,
    params: &S::Params,
    options: &FitOptions,
) -> Result<S> {
    let mut selector = template.with_params(params)?;
    selector.fit(data, options)?;
    Ok(selector)
}

/// Fit a new selector with one series-balanced partition per worker
///
/// `scoring_keys` defaults to `series_keys`; `n_workers = 1` fits the whole
/// batch in one job. See [`ParallelFitter::fit`].
///
/// # Errors
/// Returns error if `n_workers` is zero or the coordinated fit fails
pub fn fit_selector_in_parallel<S: Selector>(
    template: &S,
    params: &S::Params,
    batch: &RecordBatch,
    target: &str,
    series_keys: &[&str],
    scoring_keys: Option<&[&str]>,
    n_workers: usize,
) -> Result<S> {
    let mut builder = ParallelFitter::builder().n_workers(n_workers);
    if let Some(keys) = scoring_keys {
        builder = builder.scoring_keys(keys.iter().copied());
    }
    builder
        .build()?
        .fit(template, params, batch, target, series_keys)
}

#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(partition = partition.id, rows = partition.num_rows())
)]
fn fit_partition<S: Selector>(
    partition: &Partition,
    template: &S,
    params: &S::Params,
    options: &FitOptions,
) -> Result<S> {
    fit_selector_to_one_partition(&partition.data, template, params, options)
}

/// Concatenate scoring tables in order and carry them on the first selector
fn merge_scores<S: Selector>(selectors: Vec<S>) -> Result<S> {
    let tables = selectors
        .iter()
        .map(|selector| selector.best_scores().ok_or(Error::MissingScores))
        .collect::<Result<Vec<&RecordBatch>>>()?;

    let Some(first) = tables.first() else {
        return Err(Error::InvalidInput("no series to fit".to_string()));
    };
    let schema = first.schema();
    for table in &tables[1..] {
        if !same_columns(&schema, &table.schema()) {
            return Err(Error::SchemaMismatch {
                expected: format!("{schema:?}"),
                found: format!("{:?}", table.schema()),
            });
        }
    }
    let combined = concat_batches(&schema, tables)?;

    // An arbitrary fitted selector carries the merged scores
    let mut carrier = selectors
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidInput("no series to fit".to_string()))?;
    carrier.set_best_scores(combined);
    Ok(carrier)
}

/// Same column names and types, in order (nullability and metadata may differ)
fn same_columns(expected: &Schema, found: &Schema) -> bool {
    expected.fields().len() == found.fields().len()
        && expected
            .fields()
            .iter()
            .zip(found.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type())
}
