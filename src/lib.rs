//! # trueno-features: Feature Experiment Runner
//!
//! **Version**: 0.1.0
//!
//! Turns the "try a transform, read the metric, try another" loop of
//! feature engineering into explicit, reproducible state. The running
//! example is predicting bike-rental `duration` with a linear regression
//! trained by an external warehouse.
//!
//! ## Pipeline
//!
//! ```text
//! DataSource (Arrow tables)      exploratory GROUP BY aggregations
//!        |
//! TransformRegistry / TransformSet    weekday fusion, hour buckets, causality rule
//!        |
//! TrainingJobSubmitter -> Trainer     submit, poll (bounded), predict
//!        |
//! EvaluationCollector                 one metric query per ready model
//!        |
//! ExperimentTracker                   lowest MAE wins
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trueno_features::features::{FeatureSpec, Transform, TransformSet};
//! use trueno_features::record::RecordField;
//! use trueno_features::training::{MemoryTrainer, ScriptedOutcome};
//! use trueno_features::{ExperimentRunner, RunnerConfig};
//!
//! # async fn example() -> trueno_features::Result<()> {
//! let trainer = Arc::new(MemoryTrainer::new());
//! trainer.script("daytype", ScriptedOutcome::ready_with_mae(967.0));
//!
//! let runner = ExperimentRunner::new(trainer, RunnerConfig::default())?;
//! let set = TransformSet::new("daytype", RecordField::Duration)
//!     .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?;
//!
//! runner.run(&set).await?;
//! let (best, eval) = runner.best()?;
//! println!("{} -> {} = {}", best.name(), eval.metric_name(), eval.metric_value());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod features;
pub mod query;
pub mod record;
pub mod runner;
pub mod storage;
pub mod training;

pub use config::{PollPolicy, RunnerConfig};
pub use error::{Error, Result};
pub use runner::ExperimentRunner;
