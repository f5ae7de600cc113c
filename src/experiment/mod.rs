//! Experiment tracking
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRun (1 per TransformSetId)   Defined -> Submitted -> Ready -> Evaluated
//!                                                          \-> Failed
//! ExperimentEntry (N)                    TransformSet + EvaluationResult, ranked by metric
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use trueno_features::evaluation::EvaluationResult;
//! use trueno_features::experiment::ExperimentTracker;
//! use trueno_features::features::{FeatureSpec, Transform, TransformSet};
//! use trueno_features::record::RecordField;
//! use trueno_features::training::ModelHandle;
//!
//! # fn main() -> trueno_features::Result<()> {
//! let tracker = ExperimentTracker::new();
//! let set = TransformSet::new("daytype", RecordField::Duration)
//!     .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?;
//! let handle = ModelHandle::new("daytype", 1, Utc::now());
//!
//! tracker.record(&set, EvaluationResult::new(handle, "mean_absolute_error", 967.0))?;
//! let (best, eval) = tracker.best()?;
//! assert_eq!(best.name(), "daytype");
//! assert_eq!(eval.metric_value(), 967.0);
//! # Ok(())
//! # }
//! ```

mod run;
mod tracker;

pub use run::{ExperimentRun, ExperimentState};
pub use tracker::{ExperimentEntry, ExperimentTracker};
