//! Experiment runner
//!
//! Drives transform sets through submit -> wait -> evaluate -> record.
//! A failed step aborts that experiment only; everything already in the
//! tracker stays valid.

use crate::config::RunnerConfig;
use crate::evaluation::{EvaluationCollector, EvaluationResult};
use crate::experiment::{ExperimentRun, ExperimentTracker};
use crate::features::TransformSet;
use crate::training::{JobStatus, Trainer, TrainingJobSubmitter};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Runs feature experiments against a trainer and ranks them
#[derive(Debug)]
pub struct ExperimentRunner<T> {
    config: RunnerConfig,
    submitter: TrainingJobSubmitter<T>,
    collector: EvaluationCollector<T>,
    tracker: Arc<ExperimentTracker>,
}

impl<T: Trainer + 'static> ExperimentRunner<T> {
    /// Create a runner with a fresh tracker
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid
    pub fn new(trainer: Arc<T>, config: RunnerConfig) -> Result<Self> {
        Self::with_tracker(trainer, config, Arc::new(ExperimentTracker::new()))
    }

    /// Create a runner that records into an existing tracker
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid
    pub fn with_tracker(
        trainer: Arc<T>,
        config: RunnerConfig,
        tracker: Arc<ExperimentTracker>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            submitter: TrainingJobSubmitter::new(Arc::clone(&trainer)),
            collector: EvaluationCollector::with_metric(trainer, config.metric_name.clone()),
            config,
            tracker,
        })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Shared experiment log
    #[must_use]
    pub const fn tracker(&self) -> &Arc<ExperimentTracker> {
        &self.tracker
    }

    /// Training job submitter
    #[must_use]
    pub const fn submitter(&self) -> &TrainingJobSubmitter<T> {
        &self.submitter
    }

    /// Run one experiment to completion
    ///
    /// # Errors
    ///
    /// Returns `DuplicateExperiment` if the transform set identity already
    /// reached `Failed` or `Evaluated`, otherwise whatever aborted the
    /// failing step. A run abandoned earlier (e.g. polling gave up) is
    /// started again as a new attempt.
    #[instrument(skip(self, set), fields(set = %set.name()))]
    pub async fn run(&self, set: &TransformSet) -> Result<EvaluationResult> {
        let mut run = self.tracker.begin(set)?;
        let outcome = self.drive(set, &mut run).await;
        if let Err(e) = &outcome {
            warn!(error = %e, state = %run.state(), "experiment aborted");
            run.note_error(e);
        }
        let stored = self.tracker.update_run(&run);
        match (outcome, stored) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(result), Ok(())) => Ok(result),
        }
    }

    async fn drive(&self, set: &TransformSet, run: &mut ExperimentRun) -> Result<EvaluationResult> {
        let model_name = self.config.model_name(set.name());
        let handle = self
            .submitter
            .submit_as(set, self.config.model_kind.clone(), &model_name)
            .await?;
        run.submit(handle.clone())?;
        self.tracker.update_run(run)?;

        match self.submitter.wait_ready(&handle, &self.config.poll).await? {
            JobStatus::Ready => {
                run.mark_ready()?;
                self.tracker.update_run(run)?;
            }
            JobStatus::Failed => {
                run.mark_failed(format!("training job {handle} failed"))?;
                return Err(Error::ModelTrainingFailed(handle.to_string()));
            }
            JobStatus::Pending => return Err(Error::ModelNotReady(handle.to_string())),
        }

        let result = self.collector.evaluate(&handle).await?;
        run.mark_evaluated()?;
        // a superseded attempt must not reach the ranked log
        self.tracker.update_run(run)?;
        self.tracker.record(set, result.clone())?;
        Ok(result)
    }

    /// Run independent experiments concurrently
    ///
    /// Results come back in input order; one failure does not stop the others.
    pub async fn run_all(self: &Arc<Self>, sets: Vec<TransformSet>) -> Vec<Result<EvaluationResult>> {
        let total = sets.len();
        let mut tasks = JoinSet::new();
        for (index, set) in sets.into_iter().enumerate() {
            let runner = Arc::clone(self);
            tasks.spawn(async move { (index, runner.run(&set).await) });
        }

        let mut results: Vec<Option<Result<EvaluationResult>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "experiment task panicked or was cancelled"),
            }
        }

        let succeeded = results.iter().filter(|r| matches!(r, Some(Ok(_)))).count();
        info!(total, succeeded, "experiment batch finished");
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(Error::Other("experiment task did not complete".to_string()))))
            .collect()
    }

    /// Best configuration so far
    ///
    /// # Errors
    ///
    /// Returns `NoExperiments` if nothing was recorded
    pub fn best(&self) -> Result<(TransformSet, EvaluationResult)> {
        self.tracker.best()
    }
}
