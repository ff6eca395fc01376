use crate::errors::ForecastError;
use crate::utils::is_missing;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of a serialized regression tree.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub num: usize,
    #[serde(default)]
    pub weight_value: f64,
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub split_value: f64,
    #[serde(default)]
    pub split_feature: usize,
    #[serde(default)]
    pub missing_node: usize,
    #[serde(default)]
    pub left_child: usize,
    #[serde(default)]
    pub right_child: usize,
    pub is_leaf: bool,
}

impl Node {
    /// Create a leaf node.
    pub fn leaf(num: usize, weight_value: f64, depth: usize) -> Self {
        Node {
            num,
            weight_value,
            depth,
            split_value: 0.0,
            split_feature: 0,
            missing_node: 0,
            left_child: 0,
            right_child: 0,
            is_leaf: true,
        }
    }

    /// Create a split node, values less than `split_value` go left.
    /// Missing values go to `missing_node`.
    pub fn split(
        num: usize,
        depth: usize,
        split_feature: usize,
        split_value: f64,
        left_child: usize,
        right_child: usize,
        missing_node: usize,
    ) -> Self {
        Node {
            num,
            weight_value: 0.0,
            depth,
            split_value,
            split_feature,
            missing_node,
            left_child,
            right_child,
            is_leaf: false,
        }
    }

    /// Get the path that should be traveled down, given a value.
    pub fn get_child_idx(&self, v: &f64, missing: &f64) -> Result<usize, ForecastError> {
        if is_missing(v, missing)? {
            Ok(self.missing_node)
        } else if v < &self.split_value {
            Ok(self.left_child)
        } else {
            Ok(self.right_child)
        }
    }

    pub fn has_missing_branch(&self) -> bool {
        (self.missing_node != self.right_child) && (self.missing_node != self.left_child)
    }
}

impl fmt::Display for Node {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_leaf {
            write!(f, "{}:leaf={}", self.num, self.weight_value)
        } else {
            write!(
                f,
                "{}:[{} < {}] yes={},no={},missing={}",
                self.num,
                self.split_feature,
                self.split_value,
                self.left_child,
                self.right_child,
                self.missing_node
            )
        }
    }
}
