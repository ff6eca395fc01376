//! Historical predictions
//!
//! The table of past forecasts with their realized values, calibrated bounds and
//! stored anomaly flags, plus the date-range window the analytics run over.
use crate::anomaly::is_anomaly;
use crate::errors::ForecastError;
use crate::inference::IntervalForecast;
use crate::metric::{aggregate, AggregateMetrics};
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse the timestamp layouts written by common dataframe tools.
/// A bare date is read as midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ForecastError> {
    let s = s.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ForecastError::UnableToRead(format!("unrecognized timestamp {}", s)))
}

/// Parse a boolean column written as `True`/`False`, `true`/`false` or `1`/`0`.
pub fn parse_flag(s: &str) -> Result<bool, ForecastError> {
    match s.trim() {
        "True" | "true" | "TRUE" | "1" | "1.0" => Ok(true),
        "False" | "false" | "FALSE" | "0" | "0.0" => Ok(false),
        other => Err(ForecastError::UnableToRead(format!("unrecognized flag {}", other))),
    }
}

fn deserialize_timestamp<'de, D>(d: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

fn serialize_timestamp<S>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string())
}

fn deserialize_flag<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_flag(&s).map_err(serde::de::Error::custom)
}

/// One historical timestep.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoricalRecord {
    #[serde(
        rename = "datetime",
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    pub timestamp: NaiveDateTime,
    pub y_true: f64,
    pub p50: f64,
    /// Raw lower bound, before calibration.
    #[serde(default)]
    pub p025: Option<f64>,
    /// Raw upper bound, before calibration.
    #[serde(default)]
    pub p975: Option<f64>,
    pub p025_cal: f64,
    pub p975_cal: f64,
    /// Stored flag, read as is by the analytics.
    #[serde(deserialize_with = "deserialize_flag")]
    pub anomaly: bool,
}

impl HistoricalRecord {
    /// Build a record from a freshly scored interval, deriving the anomaly flag.
    pub fn from_forecast(timestamp: NaiveDateTime, y_true: f64, forecast: &IntervalForecast) -> Self {
        HistoricalRecord {
            timestamp,
            y_true,
            p50: forecast.p50,
            p025: Some(forecast.p025),
            p975: Some(forecast.p975),
            p025_cal: forecast.cal_lower,
            p975_cal: forecast.cal_upper,
            anomaly: is_anomaly(y_true, forecast.cal_lower, forecast.cal_upper),
        }
    }

    /// Evaluate the anomaly rule against the calibrated bounds.
    pub fn is_anomaly(&self) -> bool {
        is_anomaly(self.y_true, self.p025_cal, self.p975_cal)
    }

    /// Realized value within the calibrated bounds, inclusive.
    pub fn is_covered(&self) -> bool {
        self.p025_cal <= self.y_true && self.y_true <= self.p975_cal
    }

    pub fn abs_error(&self) -> f64 {
        (self.y_true - self.p50).abs()
    }
}

/// Historical records sorted by timestamp.
#[derive(Debug, Clone, Default)]
pub struct HistoryTable {
    records: Vec<HistoricalRecord>,
}

impl HistoryTable {
    pub fn new(mut records: Vec<HistoricalRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        HistoryTable { records }
    }

    /// Load the historical predictions table from a csv file with a header row.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| ForecastError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<HistoricalRecord>, csv::Error>>()
            .map_err(|e| ForecastError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        info!("Loaded {} historical records from {}.", records.len(), path.display());
        Ok(Self::new(records))
    }

    /// Write the table to a csv file with a header row.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ForecastError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| ForecastError::UnableToWrite(e.to_string()))?;
        for record in &self.records {
            writer
                .serialize(record)
                .map_err(|e| ForecastError::UnableToWrite(e.to_string()))?;
        }
        writer.flush().map_err(|e| ForecastError::UnableToWrite(e.to_string()))
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last calendar date in the table, the default filter bounds.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.timestamp.date(), last.timestamp.date())),
            _ => None,
        }
    }

    /// Records whose calendar date falls within `[start, end]`, inclusive.
    /// Empty when `start` is after `end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> &[HistoricalRecord] {
        let lo = self.records.partition_point(|r| r.timestamp.date() < start);
        let hi = self.records.partition_point(|r| r.timestamp.date() <= end);
        if hi <= lo {
            &[]
        } else {
            &self.records[lo..hi]
        }
    }

    /// Accuracy metrics over a date window.
    pub fn metrics(&self, start: NaiveDate, end: NaiveDate) -> Result<AggregateMetrics, ForecastError> {
        let window = self.window(start, end);
        if window.is_empty() {
            warn!("No data available between {} and {}.", start, end);
        }
        aggregate(window)
    }
}

/// Most recent record of a window.
pub fn latest(window: &[HistoricalRecord]) -> Option<&HistoricalRecord> {
    window.iter().max_by_key(|r| r.timestamp)
}
