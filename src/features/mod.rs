//! Feature transforms
//!
//! A [`FeatureSpec`] names one transform of a [`RawRecord`] and declares
//! whether its value is known at prediction time. A [`TransformSet`] is the
//! ordered list of specs plus the label, and is the unit of experimentation.
//!
//! ## Built-in transforms
//!
//! | Transform | Output | Example |
//! |---|---|---|
//! | `Passthrough(field)` | field value | `"Hyde Park Corner"` |
//! | `DayOfWeek` | day of week as string, 1 = Sunday | `"3"` |
//! | `HourOfDay` | hour as string | `"17"` |
//! | `WeekdayFusion` | `"weekday"` / `"weekend"` | `"weekend"` |
//! | `HourBucket(b)` | `bin_<n>` over the start hour | `"bin_2"` |
//! | `Registered(name)` | custom function in the registry | |
//!
//! ```rust
//! use trueno_features::features::{FeatureSpec, Transform, TransformRegistry, TransformSet};
//! use trueno_features::record::{RawRecord, RecordField};
//! use chrono::{TimeZone, Utc};
//!
//! # fn main() -> trueno_features::Result<()> {
//! let set = TransformSet::new("daytype+hourbucket", RecordField::Duration)
//!     .with_feature(FeatureSpec::new("start_station_name", Transform::Passthrough(RecordField::StartStationName)))?
//!     .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?
//!     .with_feature(FeatureSpec::hour_buckets("hourofday", vec![5.0, 10.0, 17.0])?)?;
//!
//! let record = RawRecord::new(1200.0, "Waterloo", Utc.with_ymd_and_hms(2015, 6, 7, 8, 0, 0).unwrap());
//! let vector = TransformRegistry::new().apply(&set, &record)?;
//! assert_eq!(vector.get("daytype").and_then(|v| v.as_str()), Some("weekend"));
//! assert_eq!(vector.get("hourofday").and_then(|v| v.as_str()), Some("bin_2"));
//! # Ok(())
//! # }
//! ```

mod bucketize;
mod registry;
mod transform_set;

pub use bucketize::{weekday_fusion, Bucketizer, WEEKDAY, WEEKEND};
pub use registry::{TransformFn, TransformRegistry};
pub use transform_set::{TransformSet, TransformSetId};

use crate::record::{RawRecord, RecordField};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Value of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    /// Numeric feature
    Numeric(f64),
    /// Categorical feature (one-hot encoded by the trainer)
    Categorical(String),
}

impl FeatureValue {
    /// Categorical value, if any
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Categorical(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }

    /// Numeric value, if any
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Categorical(_) => None,
        }
    }
}

/// Whether a feature may be computed for a prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Depends on information only available after the event
    TrainingOnly,
    /// Computable from what is known before the event
    PredictionSafe,
}

/// Transform definition (data only, so sets can be hashed and persisted)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Raw field value; numeric fields stay numeric
    Passthrough(RecordField),
    /// `CAST(EXTRACT(DAYOFWEEK FROM start_date) AS STRING)`
    DayOfWeek,
    /// `CAST(EXTRACT(HOUR FROM start_date) AS STRING)`
    HourOfDay,
    /// Day of week fused into weekday/weekend
    WeekdayFusion,
    /// Start hour bucketized at the given cut points
    HourBucket(Bucketizer),
    /// Custom function registered under this name
    Registered(String),
}

impl Transform {
    /// Validity implied by the fields the transform reads.
    ///
    /// Registered functions are opaque and default to training-only.
    #[must_use]
    pub const fn default_validity(&self) -> Validity {
        match self {
            Self::Passthrough(field) if !field.known_at_prediction() => Validity::TrainingOnly,
            Self::Registered(_) => Validity::TrainingOnly,
            _ => Validity::PredictionSafe,
        }
    }

    /// Evaluate a built-in transform; `None` for registered transforms.
    pub(crate) fn evaluate_builtin(&self, record: &RawRecord) -> Option<Result<FeatureValue>> {
        use chrono::{Datelike, Timelike};

        let day = i64::from(record.start_date().weekday().number_from_sunday());
        let hour = record.start_date().hour();

        let value = match self {
            Self::Passthrough(field) => passthrough(*field, record),
            Self::DayOfWeek => Ok(FeatureValue::Categorical(day.to_string())),
            Self::HourOfDay => Ok(FeatureValue::Categorical(hour.to_string())),
            Self::WeekdayFusion => {
                weekday_fusion(day).map(|label| FeatureValue::Categorical(label.to_string()))
            }
            Self::HourBucket(buckets) => {
                Ok(FeatureValue::Categorical(buckets.label(f64::from(hour))))
            }
            Self::Registered(_) => return None,
        };
        Some(value)
    }
}

#[allow(clippy::cast_precision_loss)]
fn passthrough(field: RecordField, record: &RawRecord) -> Result<FeatureValue> {
    match field {
        RecordField::Duration => Ok(FeatureValue::Numeric(record.duration())),
        RecordField::StartStationName => Ok(FeatureValue::Categorical(
            record.start_station_name().to_string(),
        )),
        RecordField::StartDate => Ok(FeatureValue::Numeric(
            record.start_date().timestamp() as f64,
        )),
        RecordField::EndStationName => record
            .end_station_name()
            .map(|s| FeatureValue::Categorical(s.to_string()))
            .ok_or_else(|| {
                crate::Error::InvalidField("end_station_name not present on record".to_string())
            }),
    }
}

/// One named transform of a raw record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSpec {
    name: String,
    transform: Transform,
    validity: Validity,
}

impl FeatureSpec {
    /// Create a spec whose validity follows [`Transform::default_validity`]
    #[must_use]
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        let validity = transform.default_validity();
        Self {
            name: name.into(),
            transform,
            validity,
        }
    }

    /// Hour-of-day bucketization
    ///
    /// # Errors
    ///
    /// Returns `InvalidBoundaries` if the cut points are not sorted and finite
    pub fn hour_buckets(name: impl Into<String>, boundaries: Vec<f64>) -> Result<Self> {
        Ok(Self::new(name, Transform::HourBucket(Bucketizer::new(boundaries)?)))
    }

    /// Override the declared validity
    #[must_use]
    pub const fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    /// Output column name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform definition
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Declared validity
    #[must_use]
    pub const fn validity(&self) -> Validity {
        self.validity
    }

    /// Whether the feature may be used at prediction time
    #[must_use]
    pub fn is_prediction_safe(&self) -> bool {
        self.validity == Validity::PredictionSafe
    }
}

/// Ordered feature values for one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    fn push(&mut self, name: impl Into<String>, value: FeatureValue) {
        self.values.push((name.into(), value));
    }

    /// Value of a named feature
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate `(name, value)` pairs in set order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of features
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn saturday_evening() -> RawRecord {
        RawRecord::new(900.0, "Soho", Utc.with_ymd_and_hms(2015, 6, 13, 18, 15, 0).unwrap())
    }

    #[test]
    fn test_default_validity() {
        assert_eq!(
            Transform::Passthrough(RecordField::EndStationName).default_validity(),
            Validity::TrainingOnly
        );
        assert_eq!(
            Transform::Passthrough(RecordField::Duration).default_validity(),
            Validity::TrainingOnly
        );
        assert_eq!(Transform::WeekdayFusion.default_validity(), Validity::PredictionSafe);
        assert_eq!(
            Transform::Registered("x".to_string()).default_validity(),
            Validity::TrainingOnly
        );
    }

    #[test]
    fn test_builtin_values() {
        let record = saturday_evening();
        let eval = |t: Transform| t.evaluate_builtin(&record).unwrap().unwrap();

        assert_eq!(eval(Transform::DayOfWeek), FeatureValue::Categorical("7".to_string()));
        assert_eq!(eval(Transform::HourOfDay), FeatureValue::Categorical("18".to_string()));
        assert_eq!(
            eval(Transform::WeekdayFusion),
            FeatureValue::Categorical(WEEKEND.to_string())
        );
        assert_eq!(
            eval(Transform::Passthrough(RecordField::Duration)),
            FeatureValue::Numeric(900.0)
        );
        assert!(Transform::Registered("x".to_string())
            .evaluate_builtin(&record)
            .is_none());
    }

    #[test]
    fn test_missing_end_station() {
        let result = Transform::Passthrough(RecordField::EndStationName)
            .evaluate_builtin(&saturday_evening())
            .unwrap();
        assert!(matches!(result, Err(crate::Error::InvalidField(_))));
    }
}
