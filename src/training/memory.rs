//! In-process trainer backend.
//!
//! Stands in for the warehouse trainer in tests and demos: outcomes are
//! scripted per model name, models are kept in a `DashMap`, and the
//! transform pipeline stored with each model is applied at prediction time.
//! Evaluation scores held-out records with that same model unless fixed
//! metrics were scripted.

use super::{JobStatus, ModelHandle, ModelRequest, Prediction, Trainer};
use crate::evaluation::{RegressionMetrics, METRIC_MAE};
use crate::features::{FeatureValue, TransformRegistry};
use crate::record::RawRecord;
use crate::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Scripted result of a training job
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedOutcome {
    pending_polls: u32,
    failure: Option<String>,
    metrics: Option<BTreeMap<String, f64>>,
    holdout: Vec<RawRecord>,
    intercept: f64,
    weights: HashMap<String, f64>,
}

impl ScriptedOutcome {
    /// Training succeeds; metrics are computed over the held-out records
    #[must_use]
    pub fn trained() -> Self {
        Self {
            pending_polls: 0,
            failure: None,
            metrics: None,
            holdout: Vec::new(),
            intercept: 0.0,
            weights: HashMap::new(),
        }
    }

    /// Training succeeds and reports exactly these metrics
    #[must_use]
    pub fn ready(metrics: BTreeMap<String, f64>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::trained()
        }
    }

    /// Training succeeds with a full regression metric set
    #[must_use]
    pub fn ready_with_metrics(metrics: &RegressionMetrics) -> Self {
        Self::ready(metrics.to_map())
    }

    /// Training succeeds reporting only mean absolute error
    #[must_use]
    pub fn ready_with_mae(mae: f64) -> Self {
        Self::ready(BTreeMap::from([(METRIC_MAE.to_string(), mae)]))
    }

    /// Training fails
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::trained()
        }
    }

    /// Report `Pending` for this many status checks first
    #[must_use]
    pub const fn pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Held-out records scored at evaluation time (label = `duration`)
    #[must_use]
    pub fn holdout(mut self, records: Vec<RawRecord>) -> Self {
        self.holdout = records;
        self
    }

    /// Prediction intercept
    #[must_use]
    pub const fn intercept(mut self, intercept: f64) -> Self {
        self.intercept = intercept;
        self
    }

    /// Prediction weight.
    ///
    /// Categorical features are keyed `name=value` (one-hot), numeric
    /// features by `name` (multiplied by the value).
    #[must_use]
    pub fn weight(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(key.into(), weight);
        self
    }
}

#[derive(Debug)]
struct ModelEntry {
    handle: ModelHandle,
    request: ModelRequest,
    polls_remaining: u32,
    outcome: ScriptedOutcome,
}

/// In-memory [`Trainer`]
#[derive(Debug, Default)]
pub struct MemoryTrainer {
    scripts: DashMap<String, ScriptedOutcome>,
    models: DashMap<String, ModelEntry>,
    generation: AtomicU64,
    registry: Arc<TransformRegistry>,
}

impl MemoryTrainer {
    /// Create a trainer using only built-in transforms
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trainer that resolves custom transforms from `registry`
    #[must_use]
    pub fn with_registry(registry: Arc<TransformRegistry>) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Script the outcome of future submissions under `model_name`.
    ///
    /// Unscripted submissions fail.
    pub fn script(&self, model_name: impl Into<String>, outcome: ScriptedOutcome) {
        self.scripts.insert(model_name.into(), outcome);
    }

    /// Number of live models (one per name)
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Transform pipeline persisted with the current model of a name
    #[must_use]
    pub fn request(&self, model_name: &str) -> Option<ModelRequest> {
        self.models.get(model_name).map(|entry| entry.request.clone())
    }

    fn check_current(entry: &ModelEntry, handle: &ModelHandle) -> Result<()> {
        if entry.handle.generation() == handle.generation() {
            Ok(())
        } else {
            Err(Error::ModelSuperseded {
                model_name: handle.model_name().to_string(),
                generation: handle.generation(),
                latest: entry.handle.generation(),
            })
        }
    }

    fn with_ready<R>(&self, handle: &ModelHandle, f: impl FnOnce(&ModelEntry) -> Result<R>) -> Result<R> {
        let entry = self
            .models
            .get(handle.model_name())
            .ok_or_else(|| Error::UnknownModel(handle.model_name().to_string()))?;
        let entry = entry.value();
        Self::check_current(entry, handle)?;
        if let Some(reason) = &entry.outcome.failure {
            return Err(Error::ModelTrainingFailed(format!("{handle}: {reason}")));
        }
        if entry.polls_remaining > 0 {
            return Err(Error::ModelNotReady(handle.to_string()));
        }
        f(entry)
    }

    /// Linear model over the stored pipeline's feature vector
    fn score(&self, entry: &ModelEntry, record: &RawRecord) -> Result<Prediction> {
        let vector = self.registry.apply(&entry.request.transform_set, record)?;
        let weights = &entry.outcome.weights;
        let contributions: Vec<(String, f64)> = vector
            .iter()
            .map(|(name, value)| {
                let contribution = match value {
                    FeatureValue::Categorical(v) => {
                        weights.get(&format!("{name}={v}")).copied().unwrap_or(0.0)
                    }
                    FeatureValue::Numeric(x) => weights.get(name).map_or(0.0, |w| w * x),
                };
                (name.to_string(), contribution)
            })
            .collect();

        Ok(Prediction {
            predicted_label: entry.outcome.intercept + contributions.iter().map(|(_, c)| c).sum::<f64>(),
            contributions,
        })
    }
}

impl Trainer for MemoryTrainer {
    async fn submit(&self, request: ModelRequest) -> Result<ModelHandle> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = ModelHandle::new(request.model_name.clone(), generation, Utc::now());
        let outcome = self
            .scripts
            .get(&request.model_name)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| ScriptedOutcome::failed("no outcome scripted for model"));

        self.models.insert(
            request.model_name.clone(),
            ModelEntry {
                handle: handle.clone(),
                request,
                polls_remaining: outcome.pending_polls,
                outcome,
            },
        );
        Ok(handle)
    }

    async fn status(&self, handle: &ModelHandle) -> Result<JobStatus> {
        let mut entry = self
            .models
            .get_mut(handle.model_name())
            .ok_or_else(|| Error::UnknownModel(handle.model_name().to_string()))?;
        Self::check_current(entry.value(), handle)?;

        if entry.polls_remaining > 0 {
            entry.polls_remaining -= 1;
            return Ok(JobStatus::Pending);
        }
        Ok(if entry.outcome.failure.is_some() {
            JobStatus::Failed
        } else {
            JobStatus::Ready
        })
    }

    async fn evaluate(&self, handle: &ModelHandle) -> Result<BTreeMap<String, f64>> {
        self.with_ready(handle, |entry| {
            if let Some(metrics) = &entry.outcome.metrics {
                return Ok(metrics.clone());
            }
            let pairs = entry
                .outcome
                .holdout
                .iter()
                .map(|record| Ok((record.duration(), self.score(entry, record)?.predicted_label)))
                .collect::<Result<Vec<_>>>()?;
            let metrics = RegressionMetrics::from_pairs(&pairs)?;
            debug!(model = %handle, rows = pairs.len(), mae = metrics.mean_absolute_error, "scored held-out records");
            Ok(metrics.to_map())
        })
    }

    async fn predict(&self, handle: &ModelHandle, record: &RawRecord) -> Result<Prediction> {
        self.with_ready(handle, |entry| {
            let set = &entry.request.transform_set;
            if let Some(spec) = set.features().iter().find(|f| !f.is_prediction_safe()) {
                return Err(Error::CausalityViolation {
                    feature: spec.name().to_string(),
                });
            }
            self.score(entry, record)
        })
    }
}
