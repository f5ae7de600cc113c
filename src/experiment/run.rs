//! Experiment run - lifecycle of one transform set

use crate::features::{TransformSet, TransformSetId};
use crate::training::ModelHandle;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of an experiment.
///
/// ```text
/// Defined -> Submitted -> Ready -> Evaluated
///                     \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentState {
    /// Transform set defined, nothing submitted yet.
    Defined,
    /// Training job submitted.
    Submitted,
    /// Training finished successfully.
    Ready,
    /// Training failed (terminal).
    Failed,
    /// Metric collected (terminal).
    Evaluated,
}

impl ExperimentState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Defined, Self::Submitted)
                | (Self::Submitted, Self::Ready | Self::Failed)
                | (Self::Ready, Self::Evaluated)
        )
    }

    /// Whether `next` is this state or lies ahead of it.
    #[must_use]
    pub fn can_reach(self, next: Self) -> bool {
        self == next
            || self.can_transition_to(next)
            || [Self::Submitted, Self::Ready]
                .into_iter()
                .any(|mid| self.can_transition_to(mid) && mid.can_reach(next))
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Evaluated)
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One experiment run: a transform set travelling through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRun {
    transform_set_id: TransformSetId,
    name: String,
    attempt: u32,
    state: ExperimentState,
    model_handle: Option<ModelHandle>,
    defined_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl ExperimentRun {
    /// Create a run in `Defined` state.
    #[must_use]
    pub fn new(set: &TransformSet) -> Self {
        Self {
            transform_set_id: set.id(),
            name: set.name().to_string(),
            attempt: 1,
            state: ExperimentState::Defined,
            model_handle: None,
            defined_at: Utc::now(),
            submitted_at: None,
            ended_at: None,
            last_error: None,
        }
    }

    /// Identity of the transform set.
    #[must_use]
    pub const fn transform_set_id(&self) -> TransformSetId {
        self.transform_set_id
    }

    /// Transform set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attempt number for this transform set identity (1-based).
    ///
    /// A run abandoned before a terminal state may be started again.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(super) const fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExperimentState {
        self.state
    }

    /// Handle of the submitted model, once submitted.
    #[must_use]
    pub const fn model_handle(&self) -> Option<&ModelHandle> {
        self.model_handle.as_ref()
    }

    /// Definition timestamp.
    #[must_use]
    pub const fn defined_at(&self) -> DateTime<Utc> {
        self.defined_at
    }

    /// Submission timestamp.
    #[must_use]
    pub const fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Time the run reached a terminal state.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Error that aborted the last step, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `Defined -> Submitted`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from any other state
    pub fn submit(&mut self, handle: ModelHandle) -> Result<()> {
        self.transition(ExperimentState::Submitted)?;
        self.submitted_at = Some(handle.submitted_at());
        self.model_handle = Some(handle);
        Ok(())
    }

    /// `Submitted -> Ready`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from any other state
    pub fn mark_ready(&mut self) -> Result<()> {
        self.transition(ExperimentState::Ready)
    }

    /// `Submitted -> Failed`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from any other state
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(ExperimentState::Failed)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// `Ready -> Evaluated`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from any other state
    pub fn mark_evaluated(&mut self) -> Result<()> {
        self.transition(ExperimentState::Evaluated)
    }

    /// Note an error that aborted a step without changing state.
    pub fn note_error(&mut self, error: &Error) {
        self.last_error = Some(error.to_string());
    }

    fn transition(&mut self, next: ExperimentState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }
}
