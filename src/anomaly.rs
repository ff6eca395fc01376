//! Anomaly flags
//!
//! A historical point is anomalous when its realized value falls outside the
//! calibrated interval that was predicted for it.
use crate::history::HistoricalRecord;
use log::warn;
use rayon::prelude::*;

/// True when `y_true` lies strictly outside `[cal_lower, cal_upper]`.
/// A NaN realized value is never flagged.
#[inline]
pub fn is_anomaly(y_true: f64, cal_lower: f64, cal_upper: f64) -> bool {
    y_true < cal_lower || y_true > cal_upper
}

/// Evaluate the anomaly rule for every record.
///
/// * `records` - Historical records, in any order.
/// * `parallel` - Evaluate records in parallel.
pub fn flag_anomalies(records: &[HistoricalRecord], parallel: bool) -> Vec<bool> {
    if parallel {
        records.par_iter().map(|r| r.is_anomaly()).collect()
    } else {
        records.iter().map(|r| r.is_anomaly()).collect()
    }
}

/// Indices of records whose stored flag disagrees with the rule,
/// which means the predictions were regenerated without refreshing the flags.
pub fn audit_flags(records: &[HistoricalRecord]) -> Vec<usize> {
    let mismatched: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.anomaly != r.is_anomaly())
        .map(|(i, _)| i)
        .collect();
    if !mismatched.is_empty() {
        warn!(
            "{} of {} stored anomaly flags disagree with the calibrated bounds.",
            mismatched.len(),
            records.len()
        );
    }
    mismatched
}
