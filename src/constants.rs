// Artifact file names
pub const MODEL_P025_FILE: &str = "model_p025.json";
pub const MODEL_P50_FILE: &str = "model_p50.json";
pub const MODEL_P975_FILE: &str = "model_p975.json";
pub const CALIBRATION_FILE: &str = "calibration.json";
pub const FEATURE_SCHEMA_FILE: &str = "features.json";
pub const HISTORY_FILE: &str = "interval_predictions.csv";
pub const FEATURE_STORE_FILE: &str = "feature_store.csv";

// Decimal places kept in a presented forecast
pub const FORECAST_PRECISION: i32 = 2;
