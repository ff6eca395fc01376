//! Inference
//!
//! The inference context owns everything loaded at startup (feature schema,
//! quantile models, calibration scalar, live-forecast defaults) and turns a
//! feature row into a calibrated forecast. It is immutable once built, so one
//! context can serve any number of callers.
use crate::conformal::{calibrate, CalibrationArtifact};
use crate::config::ForecastConfig;
use crate::constants::FORECAST_PRECISION;
use crate::data::{FeatureRow, FeatureSchema, FeatureVectorBuilder};
use crate::ensemble::{QuantileEnsemble, QuantilePrediction};
use crate::errors::ForecastError;
use crate::feature_store::FeatureStore;
use crate::history::{HistoricalRecord, HistoryTable};
use crate::utils::precision_round_half_even;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Forecast as presented to callers, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ForecastResult {
    pub forecast: f64,
    pub lower_95: f64,
    pub upper_95: f64,
}

/// Unrounded forecast with both the raw and the calibrated bounds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct IntervalForecast {
    pub p025: f64,
    pub p50: f64,
    pub p975: f64,
    pub cal_lower: f64,
    pub cal_upper: f64,
}

impl IntervalForecast {
    pub fn from_quantiles(q: QuantilePrediction, q_hat: f64) -> Self {
        let (cal_lower, cal_upper) = calibrate(q.p025, q.p975, q_hat);
        IntervalForecast {
            p025: q.p025,
            p50: q.p50,
            p975: q.p975,
            cal_lower,
            cal_upper,
        }
    }

    /// Calibrated bounds contain the point forecast.
    pub fn is_ordered(&self) -> bool {
        self.cal_lower <= self.p50 && self.p50 <= self.cal_upper
    }

    pub fn to_result(&self) -> ForecastResult {
        ForecastResult {
            forecast: precision_round_half_even(self.p50, FORECAST_PRECISION),
            lower_95: precision_round_half_even(self.cal_lower, FORECAST_PRECISION),
            upper_95: precision_round_half_even(self.cal_upper, FORECAST_PRECISION),
        }
    }
}

pub struct InferenceContext {
    builder: FeatureVectorBuilder,
    ensemble: QuantileEnsemble,
    calibration: CalibrationArtifact,
    base_row: FeatureRow,
    strict_calibration: bool,
    parallel: bool,
}

impl InferenceContext {
    /// Create a new context.
    ///
    /// * `schema` - Feature order the models were trained with.
    /// * `ensemble` - The quantile models.
    /// * `calibration` - The conformal calibration artifact.
    /// * `base_row` - Row that live-forecast overrides are written over.
    pub fn new(
        schema: FeatureSchema,
        ensemble: QuantileEnsemble,
        calibration: CalibrationArtifact,
        base_row: FeatureRow,
    ) -> Result<Self, ForecastError> {
        calibration.validate()?;
        Ok(InferenceContext {
            builder: FeatureVectorBuilder::new(schema),
            ensemble,
            calibration,
            base_row,
            strict_calibration: false,
            parallel: true,
        })
    }

    /// Load every artifact named by the configuration.
    pub fn from_config(config: &ForecastConfig) -> Result<Self, ForecastError> {
        let schema = FeatureSchema::load(config.feature_schema_path())?;
        info!("Loaded feature schema with {} features.", schema.len());
        let (p025, p50, p975) = config.model_paths();
        let ensemble = QuantileEnsemble::load_boosters(p025, p50, p975)?;
        let calibration = CalibrationArtifact::load(config.calibration_path())?;
        info!("Loaded calibration with q_hat {}.", calibration.q_hat);
        let store = FeatureStore::load_csv(config.feature_store_path())?;
        let base_row = match store.latest() {
            Some((ts, row)) => {
                info!("Live forecast defaults taken from feature row at {}.", ts);
                row.clone()
            }
            None => {
                warn!("Feature store is empty, live forecasts need every feature as an override.");
                FeatureRow::new()
            }
        };
        let context = Self::new(schema, ensemble, calibration, base_row)?
            .set_strict_calibration(config.strict_calibration)
            .set_parallel(config.parallel);
        if config.self_check {
            context.self_check()?;
        }
        Ok(context)
    }

    /// Set strict calibration checking.
    pub fn set_strict_calibration(mut self, strict_calibration: bool) -> Self {
        self.strict_calibration = strict_calibration;
        self
    }

    /// Set parallel batch scoring.
    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the models agree with the schema, then dry-run them on a
    /// schema-shaped vector.
    pub fn self_check(&self) -> Result<(), ForecastError> {
        let names = self.builder.schema().names();
        self.ensemble.check_arity(names)?;
        let dummy = vec![0.0; names.len()];
        self.ensemble.predict_quantiles(&dummy)?;
        match self.builder.build(&self.base_row) {
            Ok(vector) => {
                self.ensemble.predict_quantiles(&vector)?;
            }
            Err(ForecastError::SchemaMismatch(missing)) => {
                warn!(
                    "Skipping base row dry run, live forecasts need overrides for {}.",
                    missing.join(", ")
                );
            }
            Err(e) => return Err(e),
        }
        info!("Self check passed for {} features.", names.len());
        Ok(())
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.builder.schema()
    }

    pub fn base_row(&self) -> &FeatureRow {
        &self.base_row
    }

    pub fn calibration(&self) -> &CalibrationArtifact {
        &self.calibration
    }

    /// Live forecast: overlay `overrides` on the base row and predict.
    ///
    /// * `overrides` - Feature values to change, any subset of the schema.
    pub fn predict(&self, overrides: &FeatureRow) -> Result<ForecastResult, ForecastError> {
        let row = self.base_row.overlay(overrides);
        self.predict_row(&row)
    }

    /// Forecast a complete feature row.
    pub fn predict_row(&self, row: &FeatureRow) -> Result<ForecastResult, ForecastError> {
        Ok(self.predict_interval(row)?.to_result())
    }

    /// Unrounded forecast of a complete feature row.
    pub fn predict_interval(&self, row: &FeatureRow) -> Result<IntervalForecast, ForecastError> {
        let vector = self.builder.build(row)?;
        let quantiles = self.ensemble.predict_quantiles(&vector)?;
        let interval = IntervalForecast::from_quantiles(quantiles, self.calibration.q_hat);
        debug!(
            "p025={} p50={} p975={} calibrated=[{}, {}]",
            interval.p025, interval.p50, interval.p975, interval.cal_lower, interval.cal_upper
        );
        if !interval.is_ordered() {
            warn!(
                "Calibrated interval [{}, {}] does not contain the forecast {}, the calibration artifact may be degenerate.",
                interval.cal_lower, interval.cal_upper, interval.p50
            );
            if self.strict_calibration {
                return Err(ForecastError::CalibrationInvariant {
                    lower: interval.cal_lower,
                    forecast: interval.p50,
                    upper: interval.cal_upper,
                });
            }
        }
        Ok(interval)
    }

    /// Forecast many complete rows. The first failing row fails the batch.
    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Result<Vec<ForecastResult>, ForecastError> {
        if self.parallel {
            rows.par_iter().map(|r| self.predict_row(r)).collect()
        } else {
            rows.iter().map(|r| self.predict_row(r)).collect()
        }
    }

    /// Regenerate historical predictions for rows with known outcomes,
    /// deriving each anomaly flag from the calibrated bounds.
    ///
    /// * `rows` - Timestamp, feature row and realized value of each timestep.
    pub fn score_history(&self, rows: &[(NaiveDateTime, FeatureRow, f64)]) -> Result<HistoryTable, ForecastError> {
        let score = |(ts, row, y_true): &(NaiveDateTime, FeatureRow, f64)| {
            self.predict_interval(row)
                .map(|interval| HistoricalRecord::from_forecast(*ts, *y_true, &interval))
        };
        let records = if self.parallel {
            rows.par_iter().map(score).collect::<Result<Vec<_>, _>>()?
        } else {
            rows.iter().map(score).collect::<Result<Vec<_>, _>>()?
        };
        Ok(HistoryTable::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booster::Regressor;
    use crate::metric::aggregate;
    use chrono::NaiveDate;

    struct Constant(f64);
    impl Regressor for Constant {
        fn predict_row(&self, _row: &[f64]) -> Result<f64, ForecastError> {
            Ok(self.0)
        }
    }

    struct Linear(f64, f64);
    impl Regressor for Linear {
        fn predict_row(&self, row: &[f64]) -> Result<f64, ForecastError> {
            Ok(self.0 + self.1 * row[0])
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["temp".to_string(), "lag_1".to_string()]).unwrap()
    }

    fn constant_context(p025: f64, p50: f64, p975: f64, q_hat: f64) -> InferenceContext {
        let ensemble = QuantileEnsemble::new(Box::new(Constant(p025)), Box::new(Constant(p50)), Box::new(Constant(p975)));
        let base: FeatureRow = vec![("temp", 20.0), ("lag_1", 400.0)].into_iter().collect();
        InferenceContext::new(schema(), ensemble, CalibrationArtifact::new(q_hat, None).unwrap(), base).unwrap()
    }

    fn golden_overrides() -> FeatureRow {
        vec![
            ("temp", 25.0),
            ("rhum", 60.0),
            ("wspd", 5.0),
            ("pres", 1013.0),
            ("lag_1", 420.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_predict_golden_fixture() {
        let context = InferenceContext::from_config(&ForecastConfig::from_dir("resources")).unwrap();
        let result = context.predict(&golden_overrides()).unwrap();
        assert_eq!(
            result,
            ForecastResult {
                forecast: 427.25,
                lower_95: 375.0,
                upper_95: 476.75
            }
        );
    }

    #[test]
    fn test_predict_defaults_from_feature_store() {
        let context = InferenceContext::from_config(&ForecastConfig::from_dir("resources")).unwrap();
        let result = context.predict(&FeatureRow::new()).unwrap();
        assert_eq!(
            result,
            ForecastResult {
                forecast: 401.5,
                lower_95: 361.25,
                upper_95: 463.5
            }
        );
    }

    #[test]
    fn test_predict_is_idempotent() {
        let context = InferenceContext::from_config(&ForecastConfig::from_dir("resources")).unwrap();
        let first = context.predict(&golden_overrides()).unwrap();
        let second = context.predict(&golden_overrides()).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_calibration_applied_to_raw_bounds() {
        let context = constant_context(90.0, 100.0, 120.0, 12.5);
        let interval = context.predict_interval(context.base_row()).unwrap();
        assert_eq!(interval.cal_lower, 77.5);
        assert_eq!(interval.cal_upper, 132.5);
        assert_eq!(interval.p50, 100.0);
    }

    #[test]
    fn test_rounding_only_at_the_boundary() {
        let context = constant_context(90.004, 100.123456, 120.0051, 0.0);
        let interval = context.predict_interval(context.base_row()).unwrap();
        assert_eq!(interval.p50, 100.123456);
        assert_eq!(interval.cal_lower, 90.004);
        let result = context.predict(&FeatureRow::new()).unwrap();
        assert_eq!(result.forecast, 100.12);
        assert_eq!(result.lower_95, 90.0);
        assert_eq!(result.upper_95, 120.01);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        let context = constant_context(300.125, 427.125, 500.0, 0.0);
        let result = context.predict(&FeatureRow::new()).unwrap();
        assert_eq!(result.forecast, 427.12);
        assert_eq!(result.lower_95, 300.12);
        assert_eq!(result.upper_95, 500.0);
    }

    #[test]
    fn test_self_check_with_incomplete_base_row() {
        let ensemble = QuantileEnsemble::new(Box::new(Constant(1.0)), Box::new(Constant(2.0)), Box::new(Constant(3.0)));
        let base: FeatureRow = vec![("lag_1", 400.0)].into_iter().collect();
        let context =
            InferenceContext::new(schema(), ensemble, CalibrationArtifact::new(1.0, None).unwrap(), base).unwrap();
        assert!(context.self_check().is_ok());
    }

    #[test]
    fn test_missing_feature() {
        let ensemble = QuantileEnsemble::new(Box::new(Constant(1.0)), Box::new(Constant(2.0)), Box::new(Constant(3.0)));
        let base: FeatureRow = vec![("lag_1", 400.0)].into_iter().collect();
        let context =
            InferenceContext::new(schema(), ensemble, CalibrationArtifact::new(1.0, None).unwrap(), base).unwrap();
        match context.predict(&FeatureRow::new()) {
            Err(ForecastError::SchemaMismatch(names)) => assert_eq!(names, vec!["temp".to_string()]),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
        let overrides: FeatureRow = vec![("temp", 25.0)].into_iter().collect();
        assert!(context.predict(&overrides).is_ok());
    }

    #[test]
    fn test_inverted_interval() {
        // Lower quantile above the median, the calibration cannot repair it.
        let lenient = constant_context(120.0, 100.0, 130.0, 5.0);
        let result = lenient.predict(&FeatureRow::new()).unwrap();
        assert_eq!(result.lower_95, 115.0);
        assert!(result.lower_95 > result.forecast);

        let strict = constant_context(120.0, 100.0, 130.0, 5.0).set_strict_calibration(true);
        assert!(matches!(
            strict.predict(&FeatureRow::new()),
            Err(ForecastError::CalibrationInvariant { .. })
        ));
    }

    #[test]
    fn test_predict_batch() {
        let ensemble = QuantileEnsemble::new(
            Box::new(Linear(300.0, 2.0)),
            Box::new(Linear(320.0, 2.0)),
            Box::new(Linear(340.0, 2.0)),
        );
        let context = InferenceContext::new(schema(), ensemble, CalibrationArtifact::new(2.5, None).unwrap(), FeatureRow::new())
            .unwrap();
        let rows: Vec<FeatureRow> = (0..100)
            .map(|i| vec![("temp", i as f64), ("lag_1", 400.0)].into_iter().collect())
            .collect();
        let parallel = context.predict_batch(&rows).unwrap();
        assert_eq!(parallel.len(), 100);
        assert_eq!(parallel[10].forecast, 340.0);
        assert_eq!(parallel[10].lower_95, 317.5);
        assert_eq!(parallel[10].upper_95, 362.5);

        let context = context.set_parallel(false);
        assert_eq!(context.predict_batch(&rows).unwrap(), parallel);

        let mut broken = rows.clone();
        broken.push(vec![("lag_1", 400.0)].into_iter().collect());
        assert!(context.predict_batch(&broken).is_err());
    }

    #[test]
    fn test_score_history() {
        let context = constant_context(90.0, 100.0, 110.0, 5.0);
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let rows: Vec<(NaiveDateTime, FeatureRow, f64)> = [101.0, 130.0, 84.0, 96.0]
            .iter()
            .enumerate()
            .map(|(h, y)| (day.and_hms_opt(h as u32, 0, 0).unwrap(), context.base_row().clone(), *y))
            .collect();
        let table = context.score_history(&rows).unwrap();
        let flags: Vec<bool> = table.records().iter().map(|r| r.anomaly).collect();
        assert_eq!(flags, vec![false, true, true, false]);
        let metrics = aggregate(table.records()).unwrap();
        assert_eq!(metrics.anomaly_rate, 50.0);
        assert_eq!(metrics.coverage, 50.0);
    }

    #[test]
    fn test_self_check_rejects_mismatched_schema() {
        let ensemble = QuantileEnsemble::load_boosters(
            "resources/model_p025.json",
            "resources/model_p50.json",
            "resources/model_p975.json",
        )
        .unwrap();
        let context =
            InferenceContext::new(schema(), ensemble, CalibrationArtifact::new(1.0, None).unwrap(), FeatureRow::new())
                .unwrap();
        assert!(matches!(context.self_check(), Err(ForecastError::ModelInference(_, _))));
    }

    #[test]
    fn test_context_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InferenceContext>();
    }
}
