//! Directory scanning and JSON loading.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::tree::DataTree;

/// Extension of data files. Anything else in the directory is ignored.
const DATA_EXTENSION: &str = ".json";

/// Errors that can occur while building a data tree.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Key '{key}' is defined by both a directory and a file ({path})")]
    Collision { key: String, path: PathBuf },

    #[error("Failed to walk data directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
}

impl DataError {
    /// Whether the error is a configuration problem rather than bad content.
    ///
    /// Content errors abort a single build; fatal errors should stop the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DataError::RootNotFound(_))
    }
}

/// A JSON file discovered under the data root.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Path relative to the data root
    pub path: PathBuf,

    /// Key path: directory names, then the file name without `.json`
    pub segments: Vec<String>,

    /// Parsed content, `None` for an empty file
    pub value: Option<Value>,
}

impl FileEntry {
    /// Read and parse the file at `relative` under `root`.
    pub fn load(root: &Path, relative: &Path) -> Result<Self, DataError> {
        let segments = key_segments(relative)?;
        let full_path = root.join(relative);

        let content = fs::read_to_string(&full_path).map_err(|source| DataError::Read {
            path: full_path.clone(),
            source,
        })?;

        let content = content.trim_start_matches('\u{feff}');
        let value = if content.trim().is_empty() {
            tracing::debug!("Skipping empty data file {}", full_path.display());
            None
        } else {
            let value = serde_json::from_str(content).map_err(|e| DataError::Parse {
                path: full_path.clone(),
                message: e.to_string(),
            })?;
            Some(value)
        };

        Ok(Self {
            path: relative.to_path_buf(),
            segments,
            value,
        })
    }

    /// The leaf key this entry contributes.
    pub fn key(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

/// Build the data tree for every `.json` file under `root`.
pub fn build_data_tree(root: &Path) -> Result<DataTree, DataError> {
    let entries = scan(root)?;
    let files = entries.len();
    let tree = DataTree::fold(entries)?;

    tracing::debug!(
        "Built data tree from {} files in {} ({} leaves)",
        files,
        root.display(),
        tree.leaf_count()
    );

    Ok(tree)
}

/// Find and parse every `.json` file under `root`, in file-name order.
pub fn scan(root: &Path) -> Result<Vec<FileEntry>, DataError> {
    if !root.is_dir() {
        return Err(DataError::RootNotFound(root.to_path_buf()));
    }

    let mut entries = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !path
            .file_name()
            .is_some_and(|name| name.as_encoded_bytes().ends_with(DATA_EXTENSION.as_bytes()))
        {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .map_err(|_| DataError::InvalidPath(path.to_path_buf()))?;

        entries.push(FileEntry::load(root, relative)?);
    }

    Ok(entries)
}

/// The key under which templates see the tree: the root directory's own name.
pub fn root_key(root: &Path) -> String {
    root.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("data")
        .to_string()
}

/// Split a relative path into key segments, stripping `.json` from the last one.
fn key_segments(relative: &Path) -> Result<Vec<String>, DataError> {
    let mut segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| DataError::InvalidPath(relative.to_path_buf())),
            _ => Err(DataError::InvalidPath(relative.to_path_buf())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(last) = segments.last_mut() {
        if let Some(stem) = last.strip_suffix(DATA_EXTENSION) {
            *last = stem.to_string();
        }
    }

    Ok(segments)
}
