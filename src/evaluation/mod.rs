//! Evaluation of trained models
//!
//! [`EvaluationCollector::evaluate`] checks that a model is ready and then
//! issues exactly one metric query. It never polls: waiting for training is
//! the submitter's job ([`TrainingJobSubmitter::wait_ready`]).
//!
//! [`TrainingJobSubmitter::wait_ready`]: crate::training::TrainingJobSubmitter::wait_ready

mod metrics;

pub use metrics::{
    RegressionMetrics, METRIC_EXPLAINED_VARIANCE, METRIC_MAE, METRIC_MEDIAN_AE, METRIC_MSE,
    METRIC_MSLE, METRIC_R2,
};

use crate::training::{JobStatus, ModelHandle, Trainer};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One metric of one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    model_handle: ModelHandle,
    metric_name: String,
    metric_value: f64,
    evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Create a result stamped with the current time
    #[must_use]
    pub fn new(model_handle: ModelHandle, metric_name: impl Into<String>, metric_value: f64) -> Self {
        Self {
            model_handle,
            metric_name: metric_name.into(),
            metric_value,
            evaluated_at: Utc::now(),
        }
    }

    /// Evaluated model
    #[must_use]
    pub const fn model_handle(&self) -> &ModelHandle {
        &self.model_handle
    }

    /// Metric name
    #[must_use]
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Metric value
    #[must_use]
    pub const fn metric_value(&self) -> f64 {
        self.metric_value
    }

    /// Evaluation time
    #[must_use]
    pub const fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }
}

/// Reads one metric from ready models
#[derive(Debug)]
pub struct EvaluationCollector<T> {
    trainer: Arc<T>,
    metric_name: String,
}

impl<T> Clone for EvaluationCollector<T> {
    fn clone(&self) -> Self {
        Self {
            trainer: Arc::clone(&self.trainer),
            metric_name: self.metric_name.clone(),
        }
    }
}

impl<T: Trainer> EvaluationCollector<T> {
    /// Collect mean absolute error
    #[must_use]
    pub fn new(trainer: Arc<T>) -> Self {
        Self::with_metric(trainer, METRIC_MAE)
    }

    /// Collect another metric
    #[must_use]
    pub fn with_metric(trainer: Arc<T>, metric_name: impl Into<String>) -> Self {
        Self {
            trainer,
            metric_name: metric_name.into(),
        }
    }

    /// Collected metric name
    #[must_use]
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Evaluate a model
    ///
    /// A `Pending` status is re-checked once.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotReady` if the model is still pending after the
    /// re-check, `ModelTrainingFailed` if training failed, `MissingMetric`
    /// if the trainer does not report the configured metric
    #[instrument(skip(self), fields(model = %handle, metric = %self.metric_name))]
    pub async fn evaluate(&self, handle: &ModelHandle) -> Result<EvaluationResult> {
        let mut status = self.trainer.status(handle).await?;
        if status == JobStatus::Pending {
            debug!("model pending, re-checking once");
            status = self.trainer.status(handle).await?;
        }

        match status {
            JobStatus::Pending => Err(Error::ModelNotReady(handle.to_string())),
            JobStatus::Failed => Err(Error::ModelTrainingFailed(handle.to_string())),
            JobStatus::Ready => {
                let metrics = self.trainer.evaluate(handle).await?;
                let value = metrics
                    .get(&self.metric_name)
                    .copied()
                    .ok_or_else(|| Error::MissingMetric(self.metric_name.clone()))?;
                info!(value, "model evaluated");
                Ok(EvaluationResult::new(handle.clone(), &self.metric_name, value))
            }
        }
    }
}
