//! Transform sets: the unit of experimentation

use super::FeatureSpec;
use crate::record::RecordField;
use crate::{Error, Result};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Content hash of a transform set (label + ordered features)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransformSetId(u64);

impl TransformSetId {
    /// Raw hash value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransformSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Ordered feature specs plus the label field.
///
/// Once marked for prediction, the set refuses any training-only feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSet {
    name: String,
    label: RecordField,
    features: Vec<FeatureSpec>,
    prediction_safe: bool,
}

impl TransformSet {
    /// Create an empty set predicting `label`
    #[must_use]
    pub fn new(name: impl Into<String>, label: RecordField) -> Self {
        Self {
            name: name.into(),
            label,
            features: Vec::new(),
            prediction_safe: false,
        }
    }

    /// Builder-style [`push`](Self::push)
    ///
    /// # Errors
    ///
    /// Same as [`push`](Self::push)
    pub fn with_feature(mut self, spec: FeatureSpec) -> Result<Self> {
        self.push(spec)?;
        Ok(self)
    }

    /// Append a feature
    ///
    /// # Errors
    ///
    /// Returns `CausalityViolation` if the set is marked for prediction and the
    /// feature is training-only, `InvalidField` if the name is already taken
    pub fn push(&mut self, spec: FeatureSpec) -> Result<()> {
        if self.prediction_safe && !spec.is_prediction_safe() {
            return Err(Error::CausalityViolation {
                feature: spec.name().to_string(),
            });
        }
        if self.features.iter().any(|f| f.name() == spec.name()) {
            return Err(Error::InvalidField(format!(
                "Duplicate feature name: {}",
                spec.name()
            )));
        }
        self.features.push(spec);
        Ok(())
    }

    /// Mark the set for production prediction use
    ///
    /// # Errors
    ///
    /// Returns `CausalityViolation` naming the first training-only feature;
    /// the set is left unmarked in that case
    pub fn mark_for_prediction(&mut self) -> Result<()> {
        self.check_causality_with(true)?;
        self.prediction_safe = true;
        Ok(())
    }

    /// Builder-style [`mark_for_prediction`](Self::mark_for_prediction)
    ///
    /// # Errors
    ///
    /// Same as [`mark_for_prediction`](Self::mark_for_prediction)
    pub fn for_prediction(mut self) -> Result<Self> {
        self.mark_for_prediction()?;
        Ok(self)
    }

    /// Re-check the causality rule (e.g. after deserialization)
    ///
    /// # Errors
    ///
    /// Returns `CausalityViolation` if the set is marked for prediction but
    /// holds a training-only feature
    pub fn check_causality(&self) -> Result<()> {
        self.check_causality_with(self.prediction_safe)
    }

    fn check_causality_with(&self, prediction_safe: bool) -> Result<()> {
        if !prediction_safe {
            return Ok(());
        }
        match self.features.iter().find(|f| !f.is_prediction_safe()) {
            Some(f) => Err(Error::CausalityViolation {
                feature: f.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Content identity; the display name does not take part
    #[must_use]
    pub fn id(&self) -> TransformSetId {
        let mut hasher = FxHasher::default();
        self.label.hash(&mut hasher);
        self.features.hash(&mut hasher);
        TransformSetId(hasher.finish())
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label field
    #[must_use]
    pub const fn label(&self) -> RecordField {
        self.label
    }

    /// Feature specs in order
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Feature column names in order
    #[must_use]
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(FeatureSpec::name).collect()
    }

    /// Whether the set is marked for production prediction
    #[must_use]
    pub const fn is_prediction_safe(&self) -> bool {
        self.prediction_safe
    }
}
