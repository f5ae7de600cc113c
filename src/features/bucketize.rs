//! Pure categorical transforms: weekday fusion and bucketization

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Label for days 2..=6 (Monday to Friday)
pub const WEEKDAY: &str = "weekday";
/// Label for days 1 and 7 (Sunday, Saturday)
pub const WEEKEND: &str = "weekend";

/// Fuse a day-of-week (1 = Sunday .. 7 = Saturday) into weekday/weekend.
///
/// # Errors
///
/// Returns `OutOfRange` for values outside `[1, 7]`
///
/// # Example
///
/// ```
/// use trueno_features::features::weekday_fusion;
///
/// assert_eq!(weekday_fusion(1).unwrap(), "weekend");
/// assert_eq!(weekday_fusion(4).unwrap(), "weekday");
/// assert!(weekday_fusion(8).is_err());
/// ```
pub fn weekday_fusion(day_of_week: i64) -> Result<&'static str> {
    match day_of_week {
        2..=6 => Ok(WEEKDAY),
        1 | 7 => Ok(WEEKEND),
        value => Err(Error::OutOfRange {
            value,
            min: 1,
            max: 7,
        }),
    }
}

/// Partitions a numeric range at sorted cut points.
///
/// With `n` boundaries there are `n + 1` buckets; bucket `i` is the
/// half-open interval `[b[i-1], b[i])`, with the first and last buckets
/// open towards -inf and +inf. Labels follow the warehouse convention
/// `bin_1 .. bin_{n+1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Bucketizer {
    boundaries: Vec<f64>,
}

impl Bucketizer {
    /// Create a bucketizer from cut points.
    ///
    /// `-0.0` is stored as `0.0` so equal bucketizers hash equally.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBoundaries` if a boundary is not finite or the list is
    /// not strictly increasing
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
            return Err(Error::InvalidBoundaries(format!("non-finite boundary {b}")));
        }
        if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidBoundaries(format!(
                "boundaries must be strictly increasing, got {} then {}",
                pair[0], pair[1]
            )));
        }
        let boundaries = boundaries
            .into_iter()
            .map(|b| if b == 0.0 { 0.0 } else { b })
            .collect();
        Ok(Self { boundaries })
    }

    /// Cut points
    #[must_use]
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Number of buckets (`boundaries + 1`)
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Zero-based bucket index of a value
    #[must_use]
    pub fn bucket(&self, value: f64) -> usize {
        self.boundaries.partition_point(|&b| b <= value)
    }

    /// Bucket label of a value (`bin_<index + 1>`)
    #[must_use]
    pub fn label(&self, value: f64) -> String {
        format!("bin_{}", self.bucket(value) + 1)
    }
}

impl TryFrom<Vec<f64>> for Bucketizer {
    type Error = Error;

    fn try_from(boundaries: Vec<f64>) -> Result<Self> {
        Self::new(boundaries)
    }
}

impl From<Bucketizer> for Vec<f64> {
    fn from(bucketizer: Bucketizer) -> Self {
        bucketizer.boundaries
    }
}

// Boundaries are finite and zero is normalized, so bitwise equality matches `==`.
impl Eq for Bucketizer {}

impl Hash for Bucketizer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.boundaries.len().hash(state);
        for b in &self.boundaries {
            b.to_bits().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_fusion_table() {
        for day in 2..=6 {
            assert_eq!(weekday_fusion(day).unwrap(), WEEKDAY);
        }
        assert_eq!(weekday_fusion(1).unwrap(), WEEKEND);
        assert_eq!(weekday_fusion(7).unwrap(), WEEKEND);
        assert!(matches!(
            weekday_fusion(0),
            Err(Error::OutOfRange { value: 0, min: 1, max: 7 })
        ));
        assert!(matches!(weekday_fusion(8), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_hour_buckets() {
        let buckets = Bucketizer::new(vec![5.0, 10.0, 17.0]).unwrap();
        let hours = [0.0, 5.0, 9.0, 10.0, 16.0, 17.0, 23.0];
        let got: Vec<usize> = hours.iter().map(|&h| buckets.bucket(h)).collect();
        assert_eq!(got, vec![0, 1, 1, 2, 2, 3, 3]);
        assert_eq!(buckets.bucket_count(), 4);
        assert_eq!(buckets.label(17.0), "bin_4");
    }

    #[test]
    fn test_empty_boundaries_single_bucket() {
        let buckets = Bucketizer::new(Vec::new()).unwrap();
        assert_eq!(buckets.bucket_count(), 1);
        assert_eq!(buckets.bucket(-1e9), 0);
        assert_eq!(buckets.bucket(1e9), 0);
    }

    #[test]
    fn test_invalid_boundaries() {
        assert!(matches!(
            Bucketizer::new(vec![10.0, 5.0]),
            Err(Error::InvalidBoundaries(_))
        ));
        assert!(matches!(
            Bucketizer::new(vec![5.0, 5.0]),
            Err(Error::InvalidBoundaries(_))
        ));
        assert!(matches!(
            Bucketizer::new(vec![f64::NAN]),
            Err(Error::InvalidBoundaries(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Bucketizer = serde_json::from_str("[5.0, 10.0, 17.0]").unwrap();
        assert_eq!(ok.boundaries(), &[5.0, 10.0, 17.0]);
        assert!(serde_json::from_str::<Bucketizer>("[17.0, 5.0]").is_err());
    }

    #[test]
    fn test_negative_zero_normalized() {
        use rustc_hash::FxHasher;

        let hash = |b: &Bucketizer| {
            let mut hasher = FxHasher::default();
            b.hash(&mut hasher);
            hasher.finish()
        };
        let negative = Bucketizer::new(vec![-0.0, 10.0]).unwrap();
        let positive = Bucketizer::new(vec![0.0, 10.0]).unwrap();
        assert_eq!(negative, positive);
        assert_eq!(hash(&negative), hash(&positive));
        assert!(negative.boundaries()[0].is_sign_positive());
    }
}
