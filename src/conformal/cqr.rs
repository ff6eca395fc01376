use crate::errors::ForecastError;
use crate::utils::{order_statistic, validate_float_parameter, validate_positive_float_parameter};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persisted outcome of the conformal calibration step.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CalibrationArtifact {
    /// Symmetric widening applied to both raw bounds.
    pub q_hat: f64,
    /// Target miscoverage rate the scalar was computed for.
    #[serde(default)]
    pub alpha: Option<f64>,
}

impl CalibrationArtifact {
    pub fn new(q_hat: f64, alpha: Option<f64>) -> Result<Self, ForecastError> {
        let artifact = CalibrationArtifact { q_hat, alpha };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Compute the artifact from raw bounds on a held-out calibration set.
    /// A negative conformal quantile is clamped to zero, a wider interval keeps the guarantee.
    ///
    /// * `y` - Realized values of the calibration set.
    /// * `lower` - Raw lower quantile predictions.
    /// * `upper` - Raw upper quantile predictions.
    /// * `alpha` - Target miscoverage rate.
    pub fn from_calibration_set(y: &[f64], lower: &[f64], upper: &[f64], alpha: f64) -> Result<Self, ForecastError> {
        let scores = conformity_scores(y, lower, upper)?;
        let q_hat = fit_q_hat(&scores, alpha)?;
        if q_hat < 0.0 {
            info!("Conformal quantile {} is negative, raw intervals over-cover. Using 0.", q_hat);
        }
        Self::new(q_hat.max(0.0), Some(alpha))
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        validate_positive_float_parameter(self.q_hat, "q_hat")?;
        if let Some(alpha) = self.alpha {
            validate_float_parameter(alpha, f64::MIN_POSITIVE, 1.0, "alpha")?;
        }
        Ok(())
    }

    /// Nominal coverage of the calibrated interval, if the artifact records alpha.
    pub fn coverage_guarantee(&self) -> Option<f64> {
        self.alpha.map(|a| 1.0 - a)
    }

    /// Load a calibration artifact from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    pub fn from_json(json_str: &str) -> Result<Self, ForecastError> {
        let artifact = serde_json::from_str::<CalibrationArtifact>(json_str)
            .map_err(|e| ForecastError::UnableToRead(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load a calibration artifact from a path to a json object.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path)
            .map_err(|e| ForecastError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json_str)
    }

    /// Save the artifact as a json object to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ForecastError> {
        let json_str = serde_json::to_string(self).map_err(|e| ForecastError::UnableToWrite(e.to_string()))?;
        fs::write(path, json_str).map_err(|e| ForecastError::UnableToWrite(e.to_string()))
    }
}

/// Widen raw quantile bounds by the conformal scalar. No rounding and no
/// reordering is applied to the result.
pub fn calibrate(raw_lower: f64, raw_upper: f64, q_hat: f64) -> (f64, f64) {
    (raw_lower - q_hat, raw_upper + q_hat)
}

/// CQR nonconformity score of each record, `max(lower - y, y - upper)`.
/// Negative when the value sits strictly inside the raw interval.
pub fn conformity_scores(y: &[f64], lower: &[f64], upper: &[f64]) -> Result<Vec<f64>, ForecastError> {
    if y.len() != lower.len() || y.len() != upper.len() {
        return Err(ForecastError::InvalidParameter(
            "calibration set".to_string(),
            format!("{} lower and upper bounds", y.len()),
            format!("{} and {}", lower.len(), upper.len()),
        ));
    }
    Ok(y.iter()
        .zip(lower)
        .zip(upper)
        .map(|((y_, l_), u_)| f64::max(l_ - y_, y_ - u_))
        .collect())
}

/// Finite-sample conformal quantile, the `ceil((1 - alpha)(n + 1))`-th smallest score.
///
/// * `scores` - Nonconformity scores of the calibration set.
/// * `alpha` - Target miscoverage rate.
pub fn fit_q_hat(scores: &[f64], alpha: f64) -> Result<f64, ForecastError> {
    validate_float_parameter(alpha, f64::MIN_POSITIVE, 1.0, "alpha")?;
    if scores.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "calibration set".to_string(),
            "at least one score".to_string(),
            "0".to_string(),
        ));
    }
    let n = scores.len();
    let k = ((1.0 - alpha) * (n as f64 + 1.0)).ceil() as usize;
    if k > n {
        warn!(
            "Calibration set of {} records is too small for alpha {}, coverage is not guaranteed.",
            n, alpha
        );
    }
    Ok(order_statistic(scores, k))
}
