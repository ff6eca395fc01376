//! Feature store
//!
//! Timestamped feature rows. The most recent row seeds the defaults of a live forecast.
use crate::data::FeatureRow;
use crate::errors::ForecastError;
use crate::history::parse_timestamp;
use chrono::NaiveDateTime;
use log::info;
use std::path::Path;

const TIMESTAMP_COLUMN: &str = "datetime";

#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    rows: Vec<(NaiveDateTime, FeatureRow)>,
}

impl FeatureStore {
    pub fn new(mut rows: Vec<(NaiveDateTime, FeatureRow)>) -> Self {
        rows.sort_by_key(|(ts, _)| *ts);
        FeatureStore { rows }
    }

    /// Load a feature store from a csv file with a `datetime` column and one
    /// column per feature. Empty cells are read as missing (NaN).
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let read_err = |e: String| ForecastError::UnableToRead(format!("{}: {}", path.display(), e));
        let mut reader = csv::Reader::from_path(path).map_err(|e| read_err(e.to_string()))?;
        let headers = reader.headers().map_err(|e| read_err(e.to_string()))?.clone();
        let ts_idx = headers
            .iter()
            .position(|h| h == TIMESTAMP_COLUMN)
            .ok_or_else(|| read_err(format!("no {} column", TIMESTAMP_COLUMN)))?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| read_err(e.to_string()))?;
            let ts = parse_timestamp(record.get(ts_idx).unwrap_or_default())?;
            let mut row = FeatureRow::new();
            for (i, (name, cell)) in headers.iter().zip(record.iter()).enumerate() {
                if i == ts_idx {
                    continue;
                }
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>()
                        .map_err(|_| read_err(format!("row {}, column {}: {} is not numeric", line + 1, name, cell)))?
                };
                row.insert(name, value);
            }
            rows.push((ts, row));
        }
        info!("Loaded {} feature rows from {}.", rows.len(), path.display());
        Ok(Self::new(rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recent row and its timestamp.
    pub fn latest(&self) -> Option<(NaiveDateTime, &FeatureRow)> {
        self.rows.last().map(|(ts, row)| (*ts, row))
    }
}
