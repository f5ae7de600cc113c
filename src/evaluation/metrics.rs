//! Regression metric set

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean absolute error
pub const METRIC_MAE: &str = "mean_absolute_error";
/// Mean squared error
pub const METRIC_MSE: &str = "mean_squared_error";
/// Mean squared logarithmic error
pub const METRIC_MSLE: &str = "mean_squared_log_error";
/// Median absolute error
pub const METRIC_MEDIAN_AE: &str = "median_absolute_error";
/// Coefficient of determination
pub const METRIC_R2: &str = "r2_score";
/// Explained variance
pub const METRIC_EXPLAINED_VARIANCE: &str = "explained_variance";

/// Standard metrics of a regression model on held-out rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Average |actual - predicted|
    pub mean_absolute_error: f64,
    /// Average (actual - predicted)^2
    pub mean_squared_error: f64,
    /// Average (ln(1+actual) - ln(1+predicted))^2; NaN if any value is <= -1
    pub mean_squared_log_error: f64,
    /// Median |actual - predicted|
    pub median_absolute_error: f64,
    /// 1 - SS_res / SS_tot
    pub r2_score: f64,
    /// 1 - Var(residual) / Var(actual)
    pub explained_variance: f64,
}

impl RegressionMetrics {
    /// Compute from `(actual, predicted)` pairs
    ///
    /// # Errors
    ///
    /// Returns `Other` if `pairs` is empty
    ///
    /// # Example
    ///
    /// ```
    /// use trueno_features::evaluation::RegressionMetrics;
    ///
    /// let m = RegressionMetrics::from_pairs(&[(10.0, 12.0), (20.0, 17.0)]).unwrap();
    /// assert!((m.mean_absolute_error - 2.5).abs() < 1e-12);
    /// ```
    #[allow(clippy::cast_precision_loss)]
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::Other(
                "Cannot compute metrics without predictions".to_string(),
            ));
        }
        let n = pairs.len() as f64;

        let residuals: Vec<f64> = pairs.iter().map(|(a, p)| a - p).collect();
        let mut abs_errors: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();

        let mae = abs_errors.iter().sum::<f64>() / n;
        let mse = residuals.iter().map(|r| r * r).sum::<f64>() / n;
        let msle = if pairs.iter().all(|(a, p)| *a > -1.0 && *p > -1.0) {
            pairs
                .iter()
                .map(|(a, p)| (a.ln_1p() - p.ln_1p()).powi(2))
                .sum::<f64>()
                / n
        } else {
            f64::NAN
        };

        abs_errors.sort_by(f64::total_cmp);
        let mid = abs_errors.len() / 2;
        let median = if abs_errors.len() % 2 == 0 {
            (abs_errors[mid - 1] + abs_errors[mid]) / 2.0
        } else {
            abs_errors[mid]
        };

        let mean_actual = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
        let var_actual = pairs
            .iter()
            .map(|(a, _)| (a - mean_actual).powi(2))
            .sum::<f64>()
            / n;
        let mean_residual = residuals.iter().sum::<f64>() / n;
        let var_residual = residuals
            .iter()
            .map(|r| (r - mean_residual).powi(2))
            .sum::<f64>()
            / n;

        // Constant actuals: perfect fit scores 1, anything else 0
        let ratio_score = |num: f64| {
            if var_actual > 0.0 {
                1.0 - num / var_actual
            } else if num == 0.0 {
                1.0
            } else {
                0.0
            }
        };

        Ok(Self {
            mean_absolute_error: mae,
            mean_squared_error: mse,
            mean_squared_log_error: msle,
            median_absolute_error: median,
            r2_score: ratio_score(mse),
            explained_variance: ratio_score(var_residual),
        })
    }

    /// Metrics keyed by their warehouse names
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (METRIC_MAE.to_string(), self.mean_absolute_error),
            (METRIC_MSE.to_string(), self.mean_squared_error),
            (METRIC_MSLE.to_string(), self.mean_squared_log_error),
            (METRIC_MEDIAN_AE.to_string(), self.median_absolute_error),
            (METRIC_R2.to_string(), self.r2_score),
            (METRIC_EXPLAINED_VARIANCE.to_string(), self.explained_variance),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_known_values() {
        let m = RegressionMetrics::from_pairs(&[(3.0, 2.5), (-0.5, 0.0), (2.0, 2.0), (7.0, 8.0)])
            .unwrap();
        assert!((m.mean_absolute_error - 0.5).abs() < 1e-12);
        assert!((m.mean_squared_error - 0.375).abs() < 1e-12);
        assert!((m.median_absolute_error - 0.5).abs() < 1e-12);
        assert!((m.r2_score - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_fit() {
        let m = RegressionMetrics::from_pairs(&[(5.0, 5.0), (5.0, 5.0)]).unwrap();
        assert!(m.mean_absolute_error.abs() < f64::EPSILON);
        assert!((m.r2_score - 1.0).abs() < f64::EPSILON);
        assert!(m.mean_squared_log_error.abs() < f64::EPSILON);
    }

    #[test]
    fn test_msle_undefined_for_negative() {
        let m = RegressionMetrics::from_pairs(&[(-2.0, 1.0)]).unwrap();
        assert!(m.mean_squared_log_error.is_nan());
    }

    #[test]
    fn test_empty_pairs() {
        assert!(RegressionMetrics::from_pairs(&[]).is_err());
    }

    #[test]
    fn test_to_map_names() {
        let m = RegressionMetrics::from_pairs(&[(1.0, 2.0)]).unwrap();
        let map = m.to_map();
        assert_eq!(map.len(), 6);
        assert!((map[METRIC_MAE] - 1.0).abs() < f64::EPSILON);
    }
}
