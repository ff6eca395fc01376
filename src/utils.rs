use crate::errors::ForecastError;

pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), ForecastError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ForecastError> {
    let mut msg = String::new();
    if value.is_nan() || value < min || max <= value {
        msg.push_str(&min.to_string());
        msg.push_str(" <= ");
        msg.push_str(parameter);
        msg.push_str(" < ");
        msg.push_str(&max.to_string());
        Err(ForecastError::InvalidParameter(
            parameter.to_string(),
            msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Check if a value should be treated as missing, given the sentinel a model was trained with.
/// A NaN value only counts as missing when the sentinel is NaN too.
pub fn is_missing(value: &f64, missing: &f64) -> Result<bool, ForecastError> {
    if missing.is_nan() {
        Ok(value.is_nan())
    } else if value.is_nan() {
        Err(ForecastError::MalformedInput(format!(
            "missing value is {}, however NaN value found in data",
            missing
        )))
    } else {
        Ok(value == missing)
    }
}

/// The k-th smallest value (1-based) of the data, k is clamped to `1..=len`.
pub fn order_statistic(v: &[f64], k: usize) -> f64 {
    let mut sorted = v.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let idx = k.clamp(1, sorted.len()) - 1;
    sorted[idx]
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}

/// Round to `precision` decimals, exact ties go to the even digit.
pub fn precision_round_half_even(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round_ties_even() / p
}
