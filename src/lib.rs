//! # Paraselect: Partitioned Parallel Fitting of Time-Series Selectors
//!
//! **Version**: 0.1.0
//!
//! Paraselect fits a caller-supplied selector model on a long-format
//! time-series table (an Arrow [`RecordBatch`](arrow::record_batch::RecordBatch))
//! by splitting the table into series-balanced partitions, fitting one
//! independent selector per partition on a worker pool, and concatenating the
//! per-partition scoring tables into one fitted result.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Heijunka**: Round-robin assignment balances series across workers
//! - **Poka-Yoke safety**: A series is never split; the caller's batch is never mutated
//! - **Jidoka**: Any failing partition stops the whole fit (no partial results)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use paraselect::fit_selector_in_parallel;
//! # use paraselect::selector::{FitOptions, Selector};
//! # use arrow::record_batch::RecordBatch;
//! # struct MeanSelector;
//! # impl Selector for MeanSelector {
//! #     type Params = ();
//! #     fn with_params(&self, _: &()) -> paraselect::Result<Self> { Ok(MeanSelector) }
//! #     fn fit(&mut self, _: &RecordBatch, _: &FitOptions) -> paraselect::Result<()> { Ok(()) }
//! #     fn best_scores(&self) -> Option<&RecordBatch> { None }
//! #     fn set_best_scores(&mut self, _: RecordBatch) {}
//! # }
//! # let batch: RecordBatch = unimplemented!();
//!
//! // One partition (and one pool thread) per worker
//! let fitted = fit_selector_in_parallel(
//!     &MeanSelector,
//!     &(),
//!     &batch,
//!     "sales",
//!     &["store", "item"],
//!     None, // score every series individually
//!     4,
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod logging;
pub mod parallel;
pub mod partition;
pub mod selector;

pub use error::{Error, Result};
pub use parallel::{
    fit_selector_in_parallel, fit_selector_to_one_partition, ParallelFitConfig, ParallelFitter,
    ParallelFitterBuilder,
};
pub use partition::{add_partition_key, Partition, PARTITION_KEY_COLUMN};
pub use selector::{FitOptions, Selector};
