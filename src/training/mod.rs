//! Training job submission
//!
//! The trainer is an external service reached through the [`Trainer`]
//! trait: submission returns a handle at once, readiness is polled, and the
//! transform pipeline travels with the model so that prediction callers
//! pass raw records.
//!
//! ```rust
//! use std::sync::Arc;
//! use trueno_features::features::{FeatureSpec, Transform, TransformSet};
//! use trueno_features::record::RecordField;
//! use trueno_features::training::{JobStatus, MemoryTrainer, ModelKind, ScriptedOutcome, TrainingJobSubmitter};
//!
//! # async fn example() -> trueno_features::Result<()> {
//! let trainer = Arc::new(MemoryTrainer::new());
//! trainer.script("daytype", ScriptedOutcome::ready_with_mae(967.0));
//!
//! let set = TransformSet::new("daytype", RecordField::Duration)
//!     .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?;
//!
//! let submitter = TrainingJobSubmitter::new(trainer);
//! let handle = submitter.submit(&set, ModelKind::LinearReg).await?;
//! assert_eq!(submitter.status(&handle).await?, JobStatus::Ready);
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::{MemoryTrainer, ScriptedOutcome};

use crate::config::PollPolicy;
use crate::features::TransformSet;
use crate::record::RawRecord;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Model family requested from the trainer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ordinary least squares linear regression
    LinearReg,
    /// Any other trainer-supported kind
    Other {
        /// Kind name as understood by the trainer
        name: String,
        /// Whether the kind predicts a numeric label
        regression: bool,
    },
}

impl ModelKind {
    /// Whether the kind needs a numeric label
    #[must_use]
    pub const fn is_regression(&self) -> bool {
        match self {
            Self::LinearReg => true,
            Self::Other { regression, .. } => *regression,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinearReg => f.write_str("linear_reg"),
            Self::Other { name, .. } => f.write_str(name),
        }
    }
}

/// Training job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Still training
    Pending,
    /// Trained and queryable
    Ready,
    /// Training failed
    Failed,
}

/// Opaque reference to a submitted model.
///
/// A later submission under the same model name gets a higher generation
/// and supersedes this handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle {
    model_name: String,
    generation: u64,
    submitted_at: DateTime<Utc>,
}

impl ModelHandle {
    /// Create a handle (trainer implementations only)
    #[must_use]
    pub fn new(model_name: impl Into<String>, generation: u64, submitted_at: DateTime<Utc>) -> Self {
        Self {
            model_name: model_name.into(),
            generation,
            submitted_at,
        }
    }

    /// Model name
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Submission generation
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Submission time
    #[must_use]
    pub const fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model_name, self.generation)
    }
}

/// Model definition sent to the trainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Model name (resubmission replaces)
    pub model_name: String,
    /// Model kind
    pub kind: ModelKind,
    /// Label column, feature columns and their transform pipeline
    pub transform_set: TransformSet,
}

/// Prediction for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label
    pub predicted_label: f64,
    /// Per-feature weight contributions, if the trainer reports them
    pub contributions: Vec<(String, f64)>,
}

/// External trainer capability
pub trait Trainer: Send + Sync {
    /// Start training; returns immediately
    fn submit(&self, request: ModelRequest) -> impl Future<Output = Result<ModelHandle>> + Send;

    /// Current status of a handle
    fn status(&self, handle: &ModelHandle) -> impl Future<Output = Result<JobStatus>> + Send;

    /// Evaluation metrics of a ready model, by name
    fn evaluate(
        &self,
        handle: &ModelHandle,
    ) -> impl Future<Output = Result<BTreeMap<String, f64>>> + Send;

    /// Predict the label of a record lacking it
    fn predict(
        &self,
        handle: &ModelHandle,
        record: &RawRecord,
    ) -> impl Future<Output = Result<Prediction>> + Send;
}

/// Validates transform sets and hands them to a [`Trainer`]
#[derive(Debug)]
pub struct TrainingJobSubmitter<T> {
    trainer: Arc<T>,
}

impl<T> Clone for TrainingJobSubmitter<T> {
    fn clone(&self) -> Self {
        Self {
            trainer: Arc::clone(&self.trainer),
        }
    }
}

impl<T: Trainer> TrainingJobSubmitter<T> {
    /// Wrap a trainer
    #[must_use]
    pub const fn new(trainer: Arc<T>) -> Self {
        Self { trainer }
    }

    /// Underlying trainer
    #[must_use]
    pub const fn trainer(&self) -> &Arc<T> {
        &self.trainer
    }

    /// Submit under the transform set's name
    ///
    /// # Errors
    ///
    /// Same as [`submit_as`](Self::submit_as)
    pub async fn submit(&self, set: &TransformSet, kind: ModelKind) -> Result<ModelHandle> {
        self.submit_as(set, kind, set.name()).await
    }

    /// Submit under an explicit model name, replacing any model of that name
    ///
    /// # Errors
    ///
    /// Returns `SubmissionRejected` if the set has no features or a
    /// regression kind gets a non-numeric label, `CausalityViolation` if a
    /// prediction-marked set holds a training-only feature
    #[instrument(skip(self, set), fields(set = %set.name(), transform_set = %set.id()))]
    pub async fn submit_as(
        &self,
        set: &TransformSet,
        kind: ModelKind,
        model_name: &str,
    ) -> Result<ModelHandle> {
        set.check_causality()?;
        if set.features().is_empty() {
            return Err(Error::SubmissionRejected(format!(
                "Transform set {} has no features",
                set.name()
            )));
        }
        if kind.is_regression() && !set.label().is_numeric() {
            return Err(Error::SubmissionRejected(format!(
                "Label {} is not numeric; {kind} needs a numeric label",
                set.label()
            )));
        }

        let request = ModelRequest {
            model_name: model_name.to_string(),
            kind,
            transform_set: set.clone(),
        };
        let handle = self.trainer.submit(request).await?;
        info!(model = %handle, features = ?set.feature_names(), "submitted training job");
        Ok(handle)
    }

    /// Poll status once
    ///
    /// # Errors
    ///
    /// Propagates trainer errors (`UnknownModel`, `ModelSuperseded`)
    pub async fn status(&self, handle: &ModelHandle) -> Result<JobStatus> {
        self.trainer.status(handle).await
    }

    /// Predict the label of a raw record; the trainer applies the stored
    /// transform pipeline
    ///
    /// # Errors
    ///
    /// Propagates trainer errors (`ModelNotReady`, `CausalityViolation`)
    pub async fn predict(&self, handle: &ModelHandle, record: &RawRecord) -> Result<Prediction> {
        self.trainer.predict(handle, record).await
    }

    /// Poll until the job leaves `Pending`, within the policy's budget
    ///
    /// Returns the terminal status (`Ready` or `Failed`).
    ///
    /// # Errors
    ///
    /// Returns `ModelNotReady` once `max_attempts` checks saw `Pending`
    #[instrument(skip(self, policy), fields(model = %handle))]
    pub async fn wait_ready(&self, handle: &ModelHandle, policy: &PollPolicy) -> Result<JobStatus> {
        for attempt in 1..=policy.max_attempts {
            match self.trainer.status(handle).await? {
                JobStatus::Pending => {
                    debug!(attempt, "training still pending");
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.interval()).await;
                    }
                }
                status => return Ok(status),
            }
        }
        warn!(attempts = policy.max_attempts, "gave up waiting for training job");
        Err(Error::ModelNotReady(format!(
            "{handle} still pending after {} status checks",
            policy.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureSpec, Transform};
    use crate::record::RecordField;
    use std::time::Duration;

    fn daytype_set(name: &str) -> TransformSet {
        TransformSet::new(name, RecordField::Duration)
            .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_non_numeric_label() {
        let submitter = TrainingJobSubmitter::new(Arc::new(MemoryTrainer::new()));
        let set = TransformSet::new("by_station", RecordField::StartStationName)
            .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))
            .unwrap();

        let err = submitter.submit(&set, ModelKind::LinearReg).await.unwrap_err();
        assert!(matches!(err, Error::SubmissionRejected(_)));

        let classifier = ModelKind::Other {
            name: "logistic_reg".to_string(),
            regression: false,
        };
        assert!(submitter.submit(&set, classifier).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_empty_set() {
        let submitter = TrainingJobSubmitter::new(Arc::new(MemoryTrainer::new()));
        let set = TransformSet::new("empty", RecordField::Duration);
        assert!(matches!(
            submitter.submit(&set, ModelKind::LinearReg).await,
            Err(Error::SubmissionRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_ready_after_pending_polls() {
        let trainer = Arc::new(MemoryTrainer::new());
        trainer.script("slow", ScriptedOutcome::ready_with_mae(900.0).pending_polls(2));
        let submitter = TrainingJobSubmitter::new(trainer);

        let handle = submitter.submit(&daytype_set("slow"), ModelKind::LinearReg).await.unwrap();
        let policy = PollPolicy::new(3, Duration::from_millis(1));
        assert_eq!(submitter.wait_ready(&handle, &policy).await.unwrap(), JobStatus::Ready);
    }

    #[tokio::test]
    async fn test_wait_ready_gives_up() {
        let trainer = Arc::new(MemoryTrainer::new());
        trainer.script("stuck", ScriptedOutcome::ready_with_mae(900.0).pending_polls(10));
        let submitter = TrainingJobSubmitter::new(trainer);

        let handle = submitter.submit(&daytype_set("stuck"), ModelKind::LinearReg).await.unwrap();
        let policy = PollPolicy::new(2, Duration::from_millis(1));
        assert!(matches!(
            submitter.wait_ready(&handle, &policy).await,
            Err(Error::ModelNotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_ready_reports_failure() {
        let trainer = Arc::new(MemoryTrainer::new());
        trainer.script("broken", ScriptedOutcome::failed("singular matrix"));
        let submitter = TrainingJobSubmitter::new(trainer);

        let handle = submitter.submit(&daytype_set("broken"), ModelKind::LinearReg).await.unwrap();
        let status = submitter.wait_ready(&handle, &PollPolicy::default()).await.unwrap();
        assert_eq!(status, JobStatus::Failed);
    }

    #[test]
    fn test_model_kind_display() {
        assert_eq!(ModelKind::LinearReg.to_string(), "linear_reg");
        assert!(ModelKind::LinearReg.is_regression());
    }
}
