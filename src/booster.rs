use crate::errors::ForecastError;
use crate::tree::Tree;
use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

/// A pre-trained regressor mapping one ordered feature vector to a scalar.
///
/// Implementations must be deterministic at inference time, the same vector
/// always yields the same value.
pub trait Regressor: Send + Sync {
    /// Predict a single row.
    fn predict_row(&self, row: &[f64]) -> Result<f64, ForecastError>;

    /// Number of features the model was trained with, if the artifact records it.
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// Ordered feature names the model was trained with, if the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Smallest row length the model can be evaluated on, if known.
    fn min_row_len(&self) -> Option<usize> {
        None
    }
}

/// Gradient boosted tree ensemble trained on a quantile loss.
///
/// The prediction of a row is `base_score` plus the leaf weight reached in every tree.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct QuantileBooster {
    /// Target quantile of the loss the booster was trained with.
    #[serde(default)]
    pub quantile: Option<f64>,
    /// The initial prediction value of the model.
    pub base_score: f64,
    /// Value to consider missing.
    #[serde(deserialize_with = "parse_missing", default = "default_missing")]
    pub missing: f64,
    /// Ordered feature names used in training.
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub trees: Vec<Tree>,
    // Metadata for the booster
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn default_missing() -> f64 {
    f64::NAN
}
fn parse_missing<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(d).map(|x: Option<_>| x.unwrap_or(f64::NAN))
}

impl QuantileBooster {
    /// Create a booster from already trained trees.
    ///
    /// * `quantile` - The quantile the trees were fit to.
    /// * `base_score` - The initial prediction value of the model.
    /// * `trees` - The fitted trees.
    pub fn new(quantile: Option<f64>, base_score: f64, trees: Vec<Tree>) -> Result<Self, ForecastError> {
        let booster = QuantileBooster {
            quantile,
            base_score,
            missing: f64::NAN,
            feature_names: None,
            trees,
            metadata: HashMap::new(),
        };
        booster.validate()?;
        Ok(booster)
    }

    /// Check the artifact is internally consistent.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !self.base_score.is_finite() {
            return Err(ForecastError::MalformedModel(format!(
                "base_score must be finite, found {}",
                self.base_score
            )));
        }
        if let Some(q) = self.quantile {
            if !(0.0 < q && q < 1.0) {
                return Err(ForecastError::MalformedModel(format!("quantile must be in (0, 1), found {}", q)));
            }
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| ForecastError::MalformedModel(format!("tree {}: {}", i, e)))?;
        }
        if let (Some(names), Some(max_feature)) = (&self.feature_names, self.max_split_feature()) {
            if max_feature >= names.len() {
                return Err(ForecastError::MalformedModel(format!(
                    "trees split on feature {} but only {} feature names are recorded",
                    max_feature,
                    names.len()
                )));
            }
        }
        Ok(())
    }

    /// Largest feature index used by any tree.
    pub fn max_split_feature(&self) -> Option<usize> {
        self.trees.iter().filter_map(|t| t.max_split_feature()).max()
    }

    /// Get reference to the trees
    pub fn get_prediction_trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Save a booster as a json object to a file.
    ///
    /// * `path` - Path to save booster.
    pub fn save_booster<P: AsRef<Path>>(&self, path: P) -> Result<(), ForecastError> {
        let model = self.json_dump()?;
        match fs::write(path, model) {
            Err(e) => Err(ForecastError::UnableToWrite(e.to_string())),
            Ok(_) => Ok(()),
        }
    }

    /// Dump a booster as a json object
    pub fn json_dump(&self) -> Result<String, ForecastError> {
        match serde_json::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(ForecastError::UnableToWrite(e.to_string())),
        }
    }

    /// Load a booster from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    pub fn from_json(json_str: &str) -> Result<Self, ForecastError> {
        let model = match serde_json::from_str::<QuantileBooster>(json_str) {
            Ok(m) => Ok(m),
            Err(e) => Err(ForecastError::UnableToRead(e.to_string())),
        }?;
        model.validate()?;
        Ok(model)
    }

    /// Load a booster from a path to a json booster object.
    ///
    /// * `path` - Path to load booster from.
    pub fn load_booster<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json_str = match fs::read_to_string(path) {
            Ok(s) => Ok(s),
            Err(e) => Err(ForecastError::UnableToRead(format!("{}: {}", path.display(), e))),
        }?;
        Self::from_json(&json_str)
    }

    /// Set the feature names on the booster.
    pub fn set_feature_names(mut self, feature_names: Option<Vec<String>>) -> Self {
        self.feature_names = feature_names;
        self
    }

    /// Set missing value of the booster
    /// * `missing` - Float value to consider as missing.
    pub fn set_missing(mut self, missing: f64) -> Self {
        self.missing = missing;
        self
    }

    /// Insert metadata
    /// * `key` - String value for the metadata key.
    /// * `value` - value to assign to the metadata key.
    pub fn insert_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }

    /// Get Metadata
    /// * `key` - Get the associated value for the metadata key.
    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata.get(key).cloned()
    }
}

impl Regressor for QuantileBooster {
    fn predict_row(&self, row: &[f64]) -> Result<f64, ForecastError> {
        if let Some(n) = self.n_features() {
            if row.len() != n {
                return Err(ForecastError::MalformedInput(format!(
                    "expected {} features, found {}",
                    n,
                    row.len()
                )));
            }
        }
        let mut pred = self.base_score;
        for tree in self.get_prediction_trees() {
            pred += tree.predict_row_from_row_slice(row, &self.missing)?;
        }
        if pred.is_finite() {
            Ok(pred)
        } else {
            Err(ForecastError::MalformedModel(format!("prediction is not finite: {}", pred)))
        }
    }

    fn n_features(&self) -> Option<usize> {
        self.feature_names.as_ref().map(|f| f.len())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn min_row_len(&self) -> Option<usize> {
        self.max_split_feature().map(|f| f + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use std::fs;

    fn lag_stump() -> Tree {
        Tree::from_nodes(vec![
            Node::split(0, 0, 1, 410.0, 1, 2, 2),
            Node::leaf(1, -5.0, 1),
            Node::leaf(2, 12.5, 1),
        ])
    }

    #[test]
    fn test_booster_predict() {
        let booster = QuantileBooster::new(Some(0.5), 400.0, vec![lag_stump(), lag_stump()]).unwrap();
        assert_eq!(booster.predict_row(&[0.0, 420.0]).unwrap(), 425.0);
        assert_eq!(booster.predict_row(&[0.0, 400.0]).unwrap(), 390.0);
        assert_eq!(booster.min_row_len(), Some(2));
        assert_eq!(booster.n_features(), None);
    }

    #[test]
    fn test_booster_checks_arity() {
        let booster = QuantileBooster::new(Some(0.5), 400.0, vec![lag_stump()])
            .unwrap()
            .set_feature_names(Some(vec!["temp".to_string(), "lag_1".to_string()]));
        assert!(booster.predict_row(&[0.0, 420.0]).is_ok());
        assert!(matches!(
            booster.predict_row(&[0.0, 420.0, 1.0]),
            Err(ForecastError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_booster_rejects_bad_quantile() {
        assert!(QuantileBooster::new(Some(1.5), 400.0, vec![lag_stump()]).is_err());
        assert!(QuantileBooster::new(Some(0.5), f64::NAN, vec![lag_stump()]).is_err());
    }

    #[test]
    fn test_booster_save_load() {
        let mut booster = QuantileBooster::new(Some(0.975), 450.0, vec![lag_stump()]).unwrap();
        booster.insert_metadata("trained_on".to_string(), "2024-06".to_string());
        let path = std::env::temp_dir().join("loadcast_test_booster_save_load.json");
        booster.save_booster(&path).unwrap();
        let booster2 = QuantileBooster::load_booster(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(booster2.quantile, Some(0.975));
        assert!(booster2.missing.is_nan());
        assert_eq!(booster2.get_metadata("trained_on"), Some("2024-06".to_string()));
        assert_eq!(
            booster2.predict_row(&[0.0, 420.0]).unwrap(),
            booster.predict_row(&[0.0, 420.0]).unwrap()
        );
    }

    #[test]
    fn test_booster_missing_sentinel() {
        let tree = Tree::from_nodes(vec![
            Node::split(0, 0, 1, 410.0, 1, 2, 3),
            Node::leaf(1, -5.0, 1),
            Node::leaf(2, 12.5, 1),
            Node::leaf(3, 2.0, 1),
        ]);
        let booster = QuantileBooster::new(Some(0.5), 400.0, vec![tree.clone()]).unwrap();
        assert_eq!(booster.predict_row(&[0.0, f64::NAN]).unwrap(), 402.0);
        assert_eq!(booster.predict_row(&[0.0, -1.0]).unwrap(), 395.0);

        let booster = QuantileBooster::new(Some(0.5), 400.0, vec![tree]).unwrap().set_missing(-1.0);
        assert_eq!(booster.predict_row(&[0.0, -1.0]).unwrap(), 402.0);
        assert_eq!(booster.predict_row(&[0.0, 420.0]).unwrap(), 412.5);
        // NaN is not a valid input once another sentinel is set.
        assert!(booster.predict_row(&[0.0, f64::NAN]).is_err());

        let json = booster.json_dump().unwrap();
        let reloaded = QuantileBooster::from_json(&json).unwrap();
        assert_eq!(reloaded.missing, -1.0);
        assert_eq!(reloaded.predict_row(&[0.0, -1.0]).unwrap(), 402.0);
    }

    #[test]
    fn test_booster_from_fixture() {
        let booster = QuantileBooster::load_booster("resources/model_p50.json").unwrap();
        assert_eq!(booster.quantile, Some(0.5));
        assert_eq!(booster.n_features(), Some(8));
        assert_eq!(booster.trees.len(), 3);
    }

    #[test]
    fn test_booster_missing_file() {
        assert!(matches!(
            QuantileBooster::load_booster("resources/does_not_exist.json"),
            Err(ForecastError::UnableToRead(_))
        ));
    }
}
