use crate::errors::ForecastError;
use crate::history::HistoricalRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy metrics over a window of historical records.
/// Percentages are on a 0 to 100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AggregateMetrics {
    pub mae: f64,
    pub smape: f64,
    pub coverage: f64,
    pub anomaly_rate: f64,
    pub n_records: usize,
}

impl fmt::Display for AggregateMetrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MAE: {:.1} kW, SMAPE: {:.2}%, 95% Coverage: {:.1}%, Anomaly Rate: {:.2}%",
            self.mae, self.smape, self.coverage, self.anomaly_rate
        )
    }
}

/// Compute MAE, SMAPE, coverage and anomaly rate over a window.
/// The anomaly rate uses the stored flags, not a recomputation.
pub fn aggregate(window: &[HistoricalRecord]) -> Result<AggregateMetrics, ForecastError> {
    if window.is_empty() {
        return Err(ForecastError::EmptyWindow);
    }
    let y: Vec<f64> = window.iter().map(|r| r.y_true).collect();
    let yhat: Vec<f64> = window.iter().map(|r| r.p50).collect();
    let lower: Vec<f64> = window.iter().map(|r| r.p025_cal).collect();
    let upper: Vec<f64> = window.iter().map(|r| r.p975_cal).collect();
    let flags: Vec<bool> = window.iter().map(|r| r.anomaly).collect();
    Ok(AggregateMetrics {
        mae: mean_absolute_error(&y, &yhat),
        smape: symmetric_mean_absolute_percentage_error(&y, &yhat),
        coverage: interval_coverage(&y, &lower, &upper),
        anomaly_rate: flag_rate(&flags),
        n_records: window.len(),
    })
}

pub fn mean_absolute_error(y: &[f64], yhat: &[f64]) -> f64 {
    let res = y.iter().zip(yhat).map(|(y_, yhat_)| (y_ - yhat_).abs()).sum::<f64>();
    res / y.len() as f64
}

/// SMAPE on a 0 to 200 scale. A record where both values are zero makes the result NaN.
pub fn symmetric_mean_absolute_percentage_error(y: &[f64], yhat: &[f64]) -> f64 {
    let res = y
        .iter()
        .zip(yhat)
        .map(|(y_, yhat_)| (y_ - yhat_).abs() / ((y_.abs() + yhat_.abs()) / 2.0))
        .sum::<f64>();
    res / y.len() as f64 * 100.0
}

/// Percentage of values within their inclusive `[lower, upper]` interval.
pub fn interval_coverage(y: &[f64], lower: &[f64], upper: &[f64]) -> f64 {
    let covered = y
        .iter()
        .zip(lower.iter().zip(upper))
        .filter(|(y_, (l_, u_))| l_ <= y_ && y_ <= u_)
        .count();
    covered as f64 / y.len() as f64 * 100.0
}

/// Percentage of set flags.
pub fn flag_rate(flags: &[bool]) -> f64 {
    flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64 * 100.0
}
