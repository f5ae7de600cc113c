//! Registry of named custom transforms

use super::{FeatureSpec, FeatureValue, FeatureVector, Transform, TransformSet, Validity};
use crate::record::RawRecord;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Custom transform function
pub type TransformFn = Arc<dyn Fn(&RawRecord) -> Result<FeatureValue> + Send + Sync>;

#[derive(Clone)]
struct RegisteredTransform {
    func: TransformFn,
    validity: Validity,
}

/// Applies transform sets to raw records.
///
/// Built-in transforms need no registration; custom ones are registered
/// by name together with their validity and referenced from specs through
/// [`Transform::Registered`].
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, RegisteredTransform>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("transforms", &names)
            .finish()
    }
}

impl TransformRegistry {
    /// Create a registry with only the built-in transforms
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a custom transform
    pub fn register<F>(&mut self, name: impl Into<String>, func: F, validity: Validity)
    where
        F: Fn(&RawRecord) -> Result<FeatureValue> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(transform = %name, ?validity, "registered transform");
        self.transforms.insert(
            name,
            RegisteredTransform {
                func: Arc::new(func),
                validity,
            },
        );
    }

    /// Whether a custom transform is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Build a spec for a registered transform, carrying its validity
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransform` if nothing is registered under `transform`
    pub fn feature(&self, feature_name: impl Into<String>, transform: &str) -> Result<FeatureSpec> {
        let registered = self.lookup(transform)?;
        Ok(
            FeatureSpec::new(feature_name, Transform::Registered(transform.to_string()))
                .with_validity(registered.validity),
        )
    }

    /// Compute the feature vector of a record
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransform` for unregistered custom transforms and
    /// propagates transform failures (`OutOfRange`, `InvalidField`)
    pub fn apply(&self, set: &TransformSet, record: &RawRecord) -> Result<FeatureVector> {
        let mut vector = FeatureVector::default();
        for spec in set.features() {
            vector.push(spec.name(), self.evaluate(spec.transform(), record)?);
        }
        Ok(vector)
    }

    /// Evaluate one transform
    ///
    /// # Errors
    ///
    /// Same as [`apply`](Self::apply)
    pub fn evaluate(&self, transform: &Transform, record: &RawRecord) -> Result<FeatureValue> {
        if let Some(value) = transform.evaluate_builtin(record) {
            return value;
        }
        match transform {
            Transform::Registered(name) => (self.lookup(name)?.func)(record),
            _ => Err(Error::Other(format!("Unhandled transform: {transform:?}"))),
        }
    }

    fn lookup(&self, name: &str) -> Result<&RegisteredTransform> {
        self.transforms
            .get(name)
            .ok_or_else(|| Error::UnknownTransform(name.to_string()))
    }
}
