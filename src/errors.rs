//! Errors
//!
//! Custom error types used throughout the `loadcast` crate.
use thiserror::Error;

/// Errors that can occur while loading artifacts, forecasting, or aggregating history.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Required features are absent from the input row.
    #[error("Required features missing from input row: {0:?}")]
    SchemaMismatch(Vec<String>),
    /// The feature schema itself is unusable.
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),
    /// First value is the quantile model, second is the reason it failed.
    #[error("Model {0} failed at inference: {1}")]
    ModelInference(String, String),
    /// The model artifact is internally inconsistent.
    #[error("Malformed model: {0}")]
    MalformedModel(String),
    /// The input vector cannot be evaluated by the model.
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// The filtered analytics window contains no records.
    #[error("No data available for the selected window.")]
    EmptyWindow,
    /// Calibrated bounds do not contain the point forecast.
    #[error("Calibrated interval [{lower}, {upper}] does not contain the forecast {forecast}.")]
    CalibrationInvariant { lower: f64, forecast: f64, upper: f64 },
    /// Unable to write an artifact.
    #[error("Unable to write artifact: {0}")]
    UnableToWrite(String),
    /// Unable to read an artifact.
    #[error("Unable to read artifact {0}")]
    UnableToRead(String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
}
