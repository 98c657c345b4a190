//! Nested data tree mirroring a directory of JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::scan::{DataError, FileEntry};

/// A node in the data tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataNode {
    /// A directory
    Branch(DataTree),

    /// Parsed contents of a JSON file
    Leaf(Value),
}

impl DataNode {
    /// Convert this node into a plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            DataNode::Branch(tree) => tree.to_value(),
            DataNode::Leaf(value) => value.clone(),
        }
    }
}

/// A mapping whose key hierarchy mirrors a directory hierarchy.
///
/// Directory names become intermediate keys and file base-names (with the
/// `.json` extension stripped) become leaf keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DataTree {
    nodes: BTreeMap<String, DataNode>,
}

impl DataTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold scanned entries into a tree.
    ///
    /// Each entry is grafted onto the tree built so far, producing a new tree.
    pub fn fold<I>(entries: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = FileEntry>,
    {
        entries.into_iter().try_fold(Self::new(), |tree, entry| {
            let FileEntry {
                path,
                segments,
                value,
            } = entry;
            tree.graft(&segments, value, &path)
        })
    }

    /// Look up a direct child.
    pub fn get(&self, key: &str) -> Option<&DataNode> {
        self.nodes.get(key)
    }

    /// Keys of the direct children, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaves (non-empty JSON files) in the whole tree.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| match node {
                DataNode::Branch(tree) => tree.leaf_count(),
                DataNode::Leaf(_) => 1,
            })
            .sum()
    }

    /// Length of the longest key path from the root. An empty tree has depth 0.
    pub fn depth(&self) -> usize {
        self.nodes
            .values()
            .map(|node| match node {
                DataNode::Branch(tree) => 1 + tree.depth(),
                DataNode::Leaf(_) => 1,
            })
            .max()
            .unwrap_or(0)
    }

    /// Convert the tree into a plain JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.nodes
                .iter()
                .map(|(key, node)| (key.clone(), node.to_value()))
                .collect(),
        )
    }

    /// Attach `value` at the key path `segments`, creating intermediate
    /// branches as needed. A `None` value still creates the branches but
    /// no leaf.
    fn graft(
        mut self,
        segments: &[String],
        value: Option<Value>,
        path: &Path,
    ) -> Result<Self, DataError> {
        match segments {
            [] => Ok(self),
            [leaf] => {
                let Some(value) = value else {
                    return Ok(self);
                };
                if self.nodes.contains_key(leaf) {
                    return Err(collision(leaf, path));
                }
                self.nodes.insert(leaf.clone(), DataNode::Leaf(value));
                Ok(self)
            }
            [dir, rest @ ..] => {
                let child = match self.nodes.remove(dir) {
                    None => DataTree::new(),
                    Some(DataNode::Branch(child)) => child,
                    Some(DataNode::Leaf(_)) => return Err(collision(dir, path)),
                };
                let child = child.graft(rest, value, path)?;
                self.nodes.insert(dir.clone(), DataNode::Branch(child));
                Ok(self)
            }
        }
    }
}

fn collision(key: &str, path: &Path) -> DataError {
    DataError::Collision {
        key: key.to_string(),
        path: path.to_path_buf(),
    }
}
