//! Conformal Prediction
//!
//! Conformalized Quantile Regression (CQR) for turning raw quantile bounds into
//! prediction intervals with finite-sample coverage guarantees.

pub mod cqr;

pub use cqr::{calibrate, conformity_scores, fit_q_hat, CalibrationArtifact};
