//! Quantile Model Ensemble
//!
//! Three independently trained regressors, one per target quantile, that are
//! evaluated on the same feature vector.
use crate::booster::{QuantileBooster, Regressor};
use crate::errors::ForecastError;
use crate::utils::items_to_strings;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The quantile levels the ensemble predicts.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantileLevel {
    P025,
    P50,
    P975,
}

impl QuantileLevel {
    pub const ALL: [QuantileLevel; 3] = [QuantileLevel::P025, QuantileLevel::P50, QuantileLevel::P975];

    pub fn quantile(&self) -> f64 {
        match self {
            QuantileLevel::P025 => 0.025,
            QuantileLevel::P50 => 0.5,
            QuantileLevel::P975 => 0.975,
        }
    }
}

impl fmt::Display for QuantileLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            QuantileLevel::P025 => "p025",
            QuantileLevel::P50 => "p50",
            QuantileLevel::P975 => "p975",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for QuantileLevel {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p025" => Ok(QuantileLevel::P025),
            "p50" => Ok(QuantileLevel::P50),
            "p975" => Ok(QuantileLevel::P975),
            _ => Err(ForecastError::ParseString(
                s.to_string(),
                "QuantileLevel".to_string(),
                items_to_strings(vec!["p025", "p50", "p975"]),
            )),
        }
    }
}

/// Raw, uncalibrated quantile predictions for one row.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct QuantilePrediction {
    pub p025: f64,
    pub p50: f64,
    pub p975: f64,
}

/// One regressor per quantile level.
pub struct QuantileEnsemble {
    p025: Box<dyn Regressor>,
    p50: Box<dyn Regressor>,
    p975: Box<dyn Regressor>,
}

impl QuantileEnsemble {
    pub fn new(p025: Box<dyn Regressor>, p50: Box<dyn Regressor>, p975: Box<dyn Regressor>) -> Self {
        QuantileEnsemble { p025, p50, p975 }
    }

    /// Load the three boosters from json artifacts.
    pub fn load_boosters<P: AsRef<Path>>(p025: P, p50: P, p975: P) -> Result<Self, ForecastError> {
        let lower = QuantileBooster::load_booster(p025)?;
        let median = QuantileBooster::load_booster(p50)?;
        let upper = QuantileBooster::load_booster(p975)?;
        for (level, booster) in QuantileLevel::ALL.iter().zip([&lower, &median, &upper]) {
            if let Some(q) = booster.quantile {
                if q != level.quantile() {
                    warn!(
                        "Model loaded as {} was trained for quantile {}, expected {}.",
                        level,
                        q,
                        level.quantile()
                    );
                }
            }
        }
        Ok(Self::new(Box::new(lower), Box::new(median), Box::new(upper)))
    }

    pub fn model(&self, level: QuantileLevel) -> &dyn Regressor {
        match level {
            QuantileLevel::P025 => self.p025.as_ref(),
            QuantileLevel::P50 => self.p50.as_ref(),
            QuantileLevel::P975 => self.p975.as_ref(),
        }
    }

    fn predict_level(&self, level: QuantileLevel, vector: &[f64]) -> Result<f64, ForecastError> {
        self.model(level)
            .predict_row(vector)
            .map_err(|e| ForecastError::ModelInference(level.to_string(), e.to_string()))
    }

    /// Dispatch the same vector to every quantile model.
    ///
    /// * `vector` - Features in schema order.
    pub fn predict_quantiles(&self, vector: &[f64]) -> Result<QuantilePrediction, ForecastError> {
        Ok(QuantilePrediction {
            p025: self.predict_level(QuantileLevel::P025, vector)?,
            p50: self.predict_level(QuantileLevel::P50, vector)?,
            p975: self.predict_level(QuantileLevel::P975, vector)?,
        })
    }

    /// Check every model can consume vectors laid out by `feature_names`.
    pub fn check_arity(&self, feature_names: &[String]) -> Result<(), ForecastError> {
        for level in QuantileLevel::ALL {
            check_model_arity(self.model(level), feature_names)
                .map_err(|reason| ForecastError::ModelInference(level.to_string(), reason))?;
        }
        Ok(())
    }
}

fn check_model_arity(model: &dyn Regressor, feature_names: &[String]) -> Result<(), String> {
    if let Some(n) = model.n_features() {
        if n != feature_names.len() {
            return Err(format!(
                "model expects {} features, schema has {}",
                n,
                feature_names.len()
            ));
        }
    }
    if let Some(names) = model.feature_names() {
        if names != feature_names {
            return Err(format!(
                "model feature order {:?} does not match schema {:?}",
                names, feature_names
            ));
        }
    }
    if let Some(min_len) = model.min_row_len() {
        if min_len > feature_names.len() {
            return Err(format!(
                "model reads feature index {}, schema has {} features",
                min_len - 1,
                feature_names.len()
            ));
        }
    }
    Ok(())
}
