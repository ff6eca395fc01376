// Modules
pub mod anomaly;
pub mod booster;
pub mod config;
pub mod conformal;
pub mod constants;
pub mod data;
pub mod ensemble;
pub mod errors;
pub mod feature_store;
pub mod history;
pub mod inference;
pub mod metric;
pub mod node;
pub mod tree;
pub mod utils;

// Individual classes, and functions
pub use booster::{QuantileBooster, Regressor};
pub use config::ForecastConfig;
pub use data::{FeatureRow, FeatureSchema, FeatureVectorBuilder};
pub use ensemble::QuantileEnsemble;
pub use errors::ForecastError;
pub use inference::{ForecastResult, InferenceContext};
pub use metric::AggregateMetrics;
