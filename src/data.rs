//! Feature data containers
//!
//! The ordered feature schema the quantile models were trained on, the named
//! feature rows handed to inference, and the builder that projects one onto the other.
use crate::errors::ForecastError;
use hashbrown::{HashMap, HashSet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ordered list of feature names, in the exact column order the models expect.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Create a new schema, rejecting empty schemas and duplicated names.
    pub fn new(names: Vec<String>) -> Result<Self, ForecastError> {
        if names.is_empty() {
            return Err(ForecastError::InvalidSchema("schema has no features".to_string()));
        }
        {
            let mut seen = HashSet::with_capacity(names.len());
            for name in &names {
                if !seen.insert(name.as_str()) {
                    return Err(ForecastError::InvalidSchema(format!("feature {} is listed twice", name)));
                }
            }
        }
        Ok(FeatureSchema { names })
    }

    /// Load a schema from a json array of feature names.
    ///
    /// * `json_str` - String object, which can be serialized to json.
    pub fn from_json(json_str: &str) -> Result<Self, ForecastError> {
        let names = serde_json::from_str::<Vec<String>>(json_str)
            .map_err(|e| ForecastError::UnableToRead(e.to_string()))?;
        Self::new(names)
    }

    /// Load a schema from a path to a json array of feature names.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path)
            .map_err(|e| ForecastError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature in the schema.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A single row of named feature values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FeatureRow {
    values: HashMap<String, f64>,
}

impl FeatureRow {
    pub fn new() -> Self {
        FeatureRow { values: HashMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Set a feature value, returning the value it replaced.
    pub fn insert<K: Into<String>>(&mut self, name: K, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }

    /// Copy of this row with every value in `overrides` written over it.
    /// Names that are not already in the row are added.
    pub fn overlay(&self, overrides: &FeatureRow) -> FeatureRow {
        let mut row = self.clone();
        for (name, value) in overrides.iter() {
            if row.insert(name.clone(), *value).is_none() {
                debug!("Override {} is not part of the base row.", name);
            }
        }
        row
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        FeatureRow {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Projects named feature rows onto the schema's column order.
#[derive(Debug, Clone)]
pub struct FeatureVectorBuilder {
    schema: FeatureSchema,
}

impl FeatureVectorBuilder {
    pub fn new(schema: FeatureSchema) -> Self {
        FeatureVectorBuilder { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Build the ordered feature vector for a row.
    /// Names in the row that are not in the schema are dropped.
    ///
    /// * `row` - Named feature values, a superset of the schema is fine.
    pub fn build(&self, row: &FeatureRow) -> Result<Vec<f64>, ForecastError> {
        let mut vector = Vec::with_capacity(self.schema.len());
        let mut missing = Vec::new();
        for name in self.schema.names() {
            match row.get(name) {
                Some(v) => vector.push(v),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ForecastError::SchemaMismatch(missing));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_schema() -> FeatureSchema {
        FeatureSchema::new(
            ["temp", "rhum", "wspd", "pres", "lag_1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_follows_schema_order() {
        let builder = FeatureVectorBuilder::new(weather_schema());
        let row: FeatureRow = vec![
            ("lag_1", 420.0),
            ("pres", 1013.0),
            ("temp", 25.0),
            ("wspd", 5.0),
            ("rhum", 60.0),
        ]
        .into_iter()
        .collect();
        let v = builder.build(&row).unwrap();
        assert_eq!(v.len(), builder.schema().len());
        assert_eq!(v, vec![25.0, 60.0, 5.0, 1013.0, 420.0]);
    }

    #[test]
    fn test_build_drops_extra_features() {
        let builder = FeatureVectorBuilder::new(weather_schema());
        let row: FeatureRow = vec![
            ("temp", 25.0),
            ("rhum", 60.0),
            ("wspd", 5.0),
            ("pres", 1013.0),
            ("lag_1", 420.0),
            ("lag_168", 399.0),
            ("hour", 18.0),
        ]
        .into_iter()
        .collect();
        let v = builder.build(&row).unwrap();
        assert_eq!(v, vec![25.0, 60.0, 5.0, 1013.0, 420.0]);
    }

    #[test]
    fn test_build_missing_temp() {
        let builder = FeatureVectorBuilder::new(weather_schema());
        let row: FeatureRow = vec![("rhum", 60.0), ("wspd", 5.0), ("pres", 1013.0), ("lag_1", 420.0)]
            .into_iter()
            .collect();
        match builder.build(&row) {
            Err(ForecastError::SchemaMismatch(names)) => assert_eq!(names, vec!["temp".to_string()]),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_build_reports_every_missing_feature() {
        let builder = FeatureVectorBuilder::new(weather_schema());
        let row: FeatureRow = vec![("rhum", 60.0)].into_iter().collect();
        match builder.build(&row) {
            Err(ForecastError::SchemaMismatch(names)) => {
                assert_eq!(names, vec!["temp", "wspd", "pres", "lag_1"]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(Vec::new()).is_err());
        let dup = vec!["temp".to_string(), "rhum".to_string(), "temp".to_string()];
        assert!(matches!(FeatureSchema::new(dup), Err(ForecastError::InvalidSchema(_))));
        let schema = FeatureSchema::new(vec!["temp".to_string(), "rhum".to_string()]).unwrap();
        assert_eq!(schema.names(), &["temp".to_string(), "rhum".to_string()]);
    }

    #[test]
    fn test_schema_from_json() {
        let schema = FeatureSchema::from_json(r#"["temp", "rhum", "wspd", "pres", "lag_1"]"#).unwrap();
        assert_eq!(schema, weather_schema());
        assert_eq!(schema.index_of("pres"), Some(3));
        assert_eq!(schema.index_of("hour"), None);
        assert!(FeatureSchema::from_json(r#"{"temp": 1}"#).is_err());
    }

    #[test]
    fn test_overlay() {
        let base: FeatureRow = vec![("temp", 21.0), ("rhum", 40.0), ("lag_1", 380.0)].into_iter().collect();
        let overrides: FeatureRow = vec![("temp", 25.0), ("wspd", 5.0)].into_iter().collect();
        let row = base.overlay(&overrides);
        assert_eq!(row.get("temp"), Some(25.0));
        assert_eq!(row.get("rhum"), Some(40.0));
        assert_eq!(row.get("wspd"), Some(5.0));
        assert_eq!(row.len(), 4);
        // Base is untouched.
        assert_eq!(base.get("temp"), Some(21.0));
    }
}
