use crate::errors::ForecastError;
use crate::node::Node;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Tree {
    pub nodes: HashMap<usize, Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: HashMap::new() }
    }

    /// Build a tree from its nodes, keyed by node number.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Tree {
            nodes: nodes.into_iter().map(|n| (n.num, n)).collect(),
        }
    }

    fn get_node(&self, idx: usize) -> Result<&Node, ForecastError> {
        self.nodes
            .get(&idx)
            .ok_or_else(|| ForecastError::MalformedModel(format!("node {} is referenced but not defined", idx)))
    }

    /// Walk the tree with a single row and return the leaf weight reached.
    pub fn predict_row_from_row_slice(&self, row: &[f64], missing: &f64) -> Result<f64, ForecastError> {
        let mut node_idx = 0;
        // A path can never be longer than the number of nodes, anything
        // longer means the tree has a cycle.
        for _ in 0..=self.nodes.len() {
            let node = self.get_node(node_idx)?;
            if node.is_leaf {
                return Ok(node.weight_value);
            }
            let v = row.get(node.split_feature).ok_or_else(|| {
                ForecastError::MalformedInput(format!(
                    "node {} splits on feature {}, but the row only has {} values",
                    node.num,
                    node.split_feature,
                    row.len()
                ))
            })?;
            node_idx = node.get_child_idx(v, missing)?;
        }
        Err(ForecastError::MalformedModel("tree contains a cycle".to_string()))
    }

    /// Largest feature index any split node reads.
    pub fn max_split_feature(&self) -> Option<usize> {
        self.nodes
            .values()
            .filter(|n| !n.is_leaf)
            .map(|n| n.split_feature)
            .max()
    }

    /// Check every child reference of every split node resolves.
    pub fn validate(&self) -> Result<(), ForecastError> {
        self.get_node(0)?;
        for node in self.nodes.values().filter(|n| !n.is_leaf) {
            for child in [node.left_child, node.right_child, node.missing_node] {
                self.get_node(child)?;
            }
        }
        Ok(())
    }
}

impl Display for Tree {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = match self.nodes.get(&idx) {
                Some(n) => n,
                None => continue,
            };
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            if !node.is_leaf {
                print_buffer.push(node.right_child);
                print_buffer.push(node.left_child);
                if node.has_missing_branch() {
                    print_buffer.push(node.missing_node);
                }
            }
        }
        write!(f, "{}", r)
    }
}
