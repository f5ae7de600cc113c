//! Experiment Tracker - ranked log of evaluated transform sets

use super::ExperimentRun;
use crate::evaluation::EvaluationResult;
use crate::features::{TransformSet, TransformSetId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// A recorded `(transform set, evaluation)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEntry {
    sequence: u64,
    transform_set: TransformSet,
    result: EvaluationResult,
    recorded_at: DateTime<Utc>,
}

impl ExperimentEntry {
    /// Record order (0-based).
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Transform set that produced the result.
    #[must_use]
    pub const fn transform_set(&self) -> &TransformSet {
        &self.transform_set
    }

    /// Evaluation result.
    #[must_use]
    pub const fn result(&self) -> &EvaluationResult {
        &self.result
    }

    /// Time of recording.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Lower metric first, then earlier submission, then earlier record.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.result
            .metric_value()
            .total_cmp(&other.result.metric_value())
            .then_with(|| {
                self.result
                    .model_handle()
                    .submitted_at()
                    .cmp(&other.result.model_handle().submitted_at())
            })
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

#[derive(Debug, Default)]
struct TrackerLog {
    entries: Vec<ExperimentEntry>,
    runs: HashMap<TransformSetId, ExperimentRun>,
}

/// Ranked log of experiments.
///
/// All writers go through one lock, so concurrent `record` calls keep the
/// ranking consistent. Entries are never removed or modified.
#[derive(Debug, Default)]
pub struct ExperimentTracker {
    log: Mutex<TrackerLog>,
}

impl ExperimentTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TrackerLog>> {
        self.log
            .lock()
            .map_err(|_| Error::Other("experiment log lock poisoned".to_string()))
    }

    /// Append an evaluated transform set.
    ///
    /// # Errors
    ///
    /// Returns `Other` if the log lock is poisoned
    pub fn record(&self, set: &TransformSet, result: EvaluationResult) -> Result<()> {
        let mut log = self.lock()?;
        let sequence = log.entries.len() as u64;
        info!(
            set = %set.name(),
            transform_set = %set.id(),
            metric = %result.metric_name(),
            value = result.metric_value(),
            "recorded experiment"
        );
        log.entries.push(ExperimentEntry {
            sequence,
            transform_set: set.clone(),
            result,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    /// Best transform set so far (lowest metric).
    ///
    /// # Errors
    ///
    /// Returns `NoExperiments` if nothing was recorded
    pub fn best(&self) -> Result<(TransformSet, EvaluationResult)> {
        let log = self.lock()?;
        log.entries
            .iter()
            .min_by(|a, b| a.rank_cmp(b))
            .map(|e| (e.transform_set.clone(), e.result.clone()))
            .ok_or(Error::NoExperiments)
    }

    /// All entries, best first.
    ///
    /// # Errors
    ///
    /// Returns `Other` if the log lock is poisoned
    pub fn ranking(&self) -> Result<Vec<ExperimentEntry>> {
        let mut entries = self.lock()?.entries.clone();
        entries.sort_by(ExperimentEntry::rank_cmp);
        Ok(entries)
    }

    /// Number of recorded entries.
    ///
    /// # Errors
    ///
    /// Returns `Other` if the log lock is poisoned
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    /// Whether nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `Other` if the log lock is poisoned
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.entries.is_empty())
    }

    /// Register a new run for a transform set.
    ///
    /// A run that stopped before `Failed` or `Evaluated` (e.g. polling gave
    /// up) is replaced by a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateExperiment` if this transform set identity already
    /// has a terminal run
    pub fn begin(&self, set: &TransformSet) -> Result<ExperimentRun> {
        let mut log = self.lock()?;
        let id = set.id();
        let attempt = match log.runs.get(&id) {
            Some(previous) if previous.state().is_terminal() => {
                return Err(Error::DuplicateExperiment(id.to_string()));
            }
            Some(previous) => {
                info!(
                    set = %set.name(),
                    transform_set = %id,
                    state = %previous.state(),
                    "restarting abandoned experiment"
                );
                previous.attempt() + 1
            }
            None => 1,
        };
        let run = ExperimentRun::new(set).with_attempt(attempt);
        log.runs.insert(id, run.clone());
        Ok(run)
    }

    /// Store the latest snapshot of a run.
    ///
    /// The snapshot must belong to the current attempt and keep or advance
    /// the stored state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a stale or backwards snapshot,
    /// `Other` if the run was never begun
    pub fn update_run(&self, run: &ExperimentRun) -> Result<()> {
        let mut log = self.lock()?;
        let stored = log
            .runs
            .get_mut(&run.transform_set_id())
            .ok_or_else(|| Error::Other(format!("No run begun for {}", run.transform_set_id())))?;

        let same_attempt = stored.attempt() == run.attempt();
        let forward = stored.state().can_reach(run.state());
        if !same_attempt || !forward {
            return Err(Error::InvalidTransition {
                from: format!("{} (attempt {})", stored.state(), stored.attempt()),
                to: format!("{} (attempt {})", run.state(), run.attempt()),
            });
        }
        *stored = run.clone();
        Ok(())
    }

    /// Snapshot of a run.
    ///
    /// # Errors
    ///
    /// Returns `Other` if the log lock is poisoned
    pub fn run(&self, id: TransformSetId) -> Result<Option<ExperimentRun>> {
        Ok(self.lock()?.runs.get(&id).cloned())
    }

    /// Serialize the ranked log as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Json` if serialization fails
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.ranking()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::ExperimentState;
    use crate::features::{FeatureSpec, Transform};
    use crate::record::RecordField;
    use crate::training::ModelHandle;

    fn set(name: &str, feature: Transform) -> TransformSet {
        TransformSet::new(name, RecordField::Duration)
            .with_feature(FeatureSpec::new(name, feature))
            .unwrap()
    }

    fn result(name: &str, mae: f64) -> EvaluationResult {
        EvaluationResult::new(ModelHandle::new(name, 1, Utc::now()), "mean_absolute_error", mae)
    }

    #[test]
    fn test_best_empty() {
        assert!(matches!(ExperimentTracker::new().best(), Err(Error::NoExperiments)));
    }

    #[test]
    fn test_best_is_minimum() {
        let tracker = ExperimentTracker::new();
        tracker.record(&set("a", Transform::DayOfWeek), result("a", 967.0)).unwrap();
        tracker.record(&set("b", Transform::WeekdayFusion), result("b", 901.0)).unwrap();
        tracker.record(&set("c", Transform::HourOfDay), result("c", 1_010.0)).unwrap();

        let (best, eval) = tracker.best().unwrap();
        assert_eq!(best.name(), "b");
        assert!((eval.metric_value() - 901.0).abs() < f64::EPSILON);

        let names: Vec<String> = tracker
            .ranking()
            .unwrap()
            .iter()
            .map(|e| e.transform_set().name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_tie_prefers_earlier_submission() {
        let tracker = ExperimentTracker::new();
        let early = Utc::now();
        let late = early + chrono::Duration::seconds(5);
        let eval = |name: &str, at| {
            EvaluationResult::new(ModelHandle::new(name, 1, at), "mean_absolute_error", 900.0)
        };

        tracker.record(&set("late", Transform::DayOfWeek), eval("late", late)).unwrap();
        tracker.record(&set("early", Transform::HourOfDay), eval("early", early)).unwrap();
        assert_eq!(tracker.best().unwrap().0.name(), "early");
    }

    fn finish(tracker: &ExperimentTracker, mut run: ExperimentRun) -> ExperimentRun {
        run.submit(ModelHandle::new(run.name().to_string(), 1, Utc::now())).unwrap();
        tracker.update_run(&run).unwrap();
        run.mark_ready().unwrap();
        run.mark_evaluated().unwrap();
        tracker.update_run(&run).unwrap();
        run
    }

    #[test]
    fn test_begin_rejects_terminal_identity() {
        let tracker = ExperimentTracker::new();
        let run = tracker.begin(&set("a", Transform::DayOfWeek)).unwrap();
        finish(&tracker, run);

        assert!(matches!(
            tracker.begin(&set("a", Transform::DayOfWeek)),
            Err(Error::DuplicateExperiment(_))
        ));
        assert!(tracker.begin(&set("a", Transform::HourOfDay)).is_ok());
    }

    #[test]
    fn test_begin_restarts_abandoned_run() {
        let tracker = ExperimentTracker::new();
        let mut first = tracker.begin(&set("a", Transform::DayOfWeek)).unwrap();
        first.submit(ModelHandle::new("a", 1, Utc::now())).unwrap();
        tracker.update_run(&first).unwrap();

        let second = tracker.begin(&set("a", Transform::DayOfWeek)).unwrap();
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.state(), ExperimentState::Defined);

        // the abandoned attempt can no longer write
        first.mark_ready().unwrap();
        assert!(matches!(
            tracker.update_run(&first),
            Err(Error::InvalidTransition { .. })
        ));
        let stored = tracker.run(second.transform_set_id()).unwrap().unwrap();
        assert_eq!(stored.attempt(), 2);
    }

    #[test]
    fn test_update_run_rejects_stale_snapshot() {
        let tracker = ExperimentTracker::new();
        let stale = tracker.begin(&set("a", Transform::DayOfWeek)).unwrap();
        let evaluated = finish(&tracker, stale.clone());

        assert!(matches!(
            tracker.update_run(&stale),
            Err(Error::InvalidTransition { .. })
        ));
        let stored = tracker.run(stale.transform_set_id()).unwrap().unwrap();
        assert_eq!(stored.state(), ExperimentState::Evaluated);
        assert_eq!(stored, evaluated);
    }

    #[test]
    fn test_update_run_requires_begin() {
        let tracker = ExperimentTracker::new();
        let run = ExperimentRun::new(&set("a", Transform::DayOfWeek));
        assert!(tracker.update_run(&run).is_err());
    }

    #[test]
    fn test_export_json() {
        let tracker = ExperimentTracker::new();
        tracker.record(&set("a", Transform::DayOfWeek), result("a", 967.0)).unwrap();
        let json = tracker.export_json().unwrap();
        let parsed: Vec<ExperimentEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].transform_set().name(), "a");
    }
}
