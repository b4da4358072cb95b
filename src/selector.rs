//! Selector capability
//!
//! A selector is any model that, given long-format time-series data, chooses
//! or fits a forecasting approach and records per-group quality scores in a
//! scoring table. The coordinator never looks inside a selector beyond this
//! trait.

use crate::Result;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

/// Options passed to [`Selector::fit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitOptions {
    target: String,
    series_keys: Vec<String>,
    scoring_keys: Vec<String>,
}

impl FitOptions {
    /// Create fit options
    ///
    /// When `scoring_keys` is `None` or empty, scores are computed per
    /// individual series (the scoring keys fall back to the series keys).
    #[must_use]
    pub fn new(
        target: impl Into<String>,
        series_keys: &[&str],
        scoring_keys: Option<&[&str]>,
    ) -> Self {
        let series_keys: Vec<String> = series_keys.iter().map(ToString::to_string).collect();
        let scoring_keys = scoring_keys.filter(|keys| !keys.is_empty()).map_or_else(
            || series_keys.clone(),
            |keys| keys.iter().map(ToString::to_string).collect(),
        );

        Self {
            target: target.into(),
            series_keys,
            scoring_keys,
        }
    }

    /// Name of the target column
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Columns identifying unique time series
    #[must_use]
    pub fn series_keys(&self) -> &[String] {
        &self.series_keys
    }

    /// Columns identifying the groups that scores are computed for
    #[must_use]
    pub fn scoring_keys(&self) -> &[String] {
        &self.scoring_keys
    }
}

/// Pluggable selector fitted once per partition
///
/// Implementations must be `Send + Sync`: the template is shared read-only
/// by every worker and each fitted instance moves back to the caller.
///
/// # Example
///
/// ```rust
/// use paraselect::selector::{FitOptions, Selector};
/// use arrow::record_batch::RecordBatch;
///
/// #[derive(Default)]
/// struct RowCounter {
///     scores: Option<RecordBatch>,
/// }
///
/// impl Selector for RowCounter {
///     type Params = ();
///
///     fn with_params(&self, _params: &()) -> paraselect::Result<Self> {
///         Ok(Self::default())
///     }
///
///     fn fit(&mut self, data: &RecordBatch, _options: &FitOptions) -> paraselect::Result<()> {
///         self.scores = Some(data.clone());
///         Ok(())
///     }
///
///     fn best_scores(&self) -> Option<&RecordBatch> {
///         self.scores.as_ref()
///     }
///
///     fn set_best_scores(&mut self, scores: RecordBatch) {
///         self.scores = Some(scores);
///     }
/// }
/// ```
pub trait Selector: Sized + Send + Sync {
    /// Initialization parameters applied on top of the template's configuration
    type Params: Send + Sync;

    /// Create a fresh, unfitted instance of the same type
    ///
    /// The new instance carries the template's configuration overridden by
    /// `params` and shares no fit state with the template.
    ///
    /// # Errors
    /// Returns error if `params` are invalid for this selector
    fn with_params(&self, params: &Self::Params) -> Result<Self>;

    /// Fit to long-format data
    ///
    /// # Errors
    /// Returns error if fitting fails; the whole coordinated fit fails with it
    fn fit(&mut self, data: &RecordBatch, options: &FitOptions) -> Result<()>;

    /// Scoring table of a fitted selector
    fn best_scores(&self) -> Option<&RecordBatch>;

    /// Replace the scoring table
    fn set_best_scores(&mut self, scores: RecordBatch);
}
