//! Configuration
//!
//! Where the artifacts live and how the inference context treats them.
use crate::constants::{
    CALIBRATION_FILE, FEATURE_SCHEMA_FILE, FEATURE_STORE_FILE, HISTORY_FILE, MODEL_P025_FILE, MODEL_P50_FILE,
    MODEL_P975_FILE,
};
use crate::errors::ForecastError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File names of the persisted artifacts, relative to the artifacts directory.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArtifactFiles {
    #[serde(default = "default_model_p025")]
    pub model_p025: String,
    #[serde(default = "default_model_p50")]
    pub model_p50: String,
    #[serde(default = "default_model_p975")]
    pub model_p975: String,
    #[serde(default = "default_calibration")]
    pub calibration: String,
    #[serde(default = "default_feature_schema")]
    pub feature_schema: String,
    #[serde(default = "default_history")]
    pub history: String,
    #[serde(default = "default_feature_store")]
    pub feature_store: String,
}

fn default_model_p025() -> String {
    MODEL_P025_FILE.to_string()
}
fn default_model_p50() -> String {
    MODEL_P50_FILE.to_string()
}
fn default_model_p975() -> String {
    MODEL_P975_FILE.to_string()
}
fn default_calibration() -> String {
    CALIBRATION_FILE.to_string()
}
fn default_feature_schema() -> String {
    FEATURE_SCHEMA_FILE.to_string()
}
fn default_history() -> String {
    HISTORY_FILE.to_string()
}
fn default_feature_store() -> String {
    FEATURE_STORE_FILE.to_string()
}

impl Default for ArtifactFiles {
    fn default() -> Self {
        ArtifactFiles {
            model_p025: default_model_p025(),
            model_p50: default_model_p50(),
            model_p975: default_model_p975(),
            calibration: default_calibration(),
            feature_schema: default_feature_schema(),
            history: default_history(),
            feature_store: default_feature_store(),
        }
    }
}

/// Forecasting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForecastConfig {
    /// Directory holding every artifact.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default)]
    pub files: ArtifactFiles,
    /// Return an error instead of a forecast when the calibrated interval does
    /// not contain the point forecast. The inversion is logged either way.
    #[serde(default = "default_strict_calibration")]
    pub strict_calibration: bool,
    /// Check model arity against the schema and dry-run every model on the
    /// base row when the context is built.
    #[serde(default = "default_self_check")]
    pub self_check: bool,
    /// Score batches in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
fn default_strict_calibration() -> bool {
    false
}
fn default_self_check() -> bool {
    true
}
fn default_parallel() -> bool {
    true
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            artifacts_dir: default_artifacts_dir(),
            files: ArtifactFiles::default(),
            strict_calibration: default_strict_calibration(),
            self_check: default_self_check(),
            parallel: default_parallel(),
        }
    }
}

impl ForecastConfig {
    /// Default configuration rooted at `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        ForecastConfig {
            artifacts_dir: dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a configuration from Json string, unset fields take their defaults.
    pub fn from_json(json_str: &str) -> Result<Self, ForecastError> {
        serde_json::from_str::<ForecastConfig>(json_str).map_err(|e| ForecastError::UnableToRead(e.to_string()))
    }

    /// Load a configuration from a json file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path)
            .map_err(|e| ForecastError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json_str)
    }

    /// Set strict calibration checking.
    pub fn set_strict_calibration(mut self, strict_calibration: bool) -> Self {
        self.strict_calibration = strict_calibration;
        self
    }

    /// Set the startup self check.
    pub fn set_self_check(mut self, self_check: bool) -> Self {
        self.self_check = self_check;
        self
    }

    /// Set parallel batch scoring.
    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn resolve(&self, file: &str) -> PathBuf {
        self.artifacts_dir.join(file)
    }

    pub fn model_paths(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.resolve(&self.files.model_p025),
            self.resolve(&self.files.model_p50),
            self.resolve(&self.files.model_p975),
        )
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.resolve(&self.files.calibration)
    }

    pub fn feature_schema_path(&self) -> PathBuf {
        self.resolve(&self.files.feature_schema)
    }

    pub fn history_path(&self) -> PathBuf {
        self.resolve(&self.files.history)
    }

    pub fn feature_store_path(&self) -> PathBuf {
        self.resolve(&self.files.feature_store)
    }
}
