//! Output targets: a real directory or an in-memory file map.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Where a build writes its files.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    /// Write under a directory on disk
    Disk(PathBuf),

    /// Keep files in memory (used by the dev server)
    Memory(MemoryOutput),
}

impl OutputTarget {
    /// Write `contents` at `relative` inside the target.
    pub fn write(&self, relative: &Path, contents: &[u8]) -> io::Result<()> {
        match self {
            OutputTarget::Disk(root) => {
                let path = root.join(relative);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)
            }
            OutputTarget::Memory(memory) => {
                memory.write(relative, contents);
                Ok(())
            }
        }
    }

    /// Remove everything previously written, keeping the target itself.
    pub fn clean(&self) -> io::Result<()> {
        match self {
            OutputTarget::Disk(root) => {
                if !root.exists() {
                    return Ok(());
                }
                for entry in fs::read_dir(root)? {
                    let path = entry?.path();
                    if path.is_dir() {
                        fs::remove_dir_all(&path)?;
                    } else {
                        fs::remove_file(&path)?;
                    }
                }
                Ok(())
            }
            OutputTarget::Memory(memory) => {
                memory.clear();
                Ok(())
            }
        }
    }

    /// Human-readable description for log lines.
    pub fn describe(&self) -> String {
        match self {
            OutputTarget::Disk(root) => root.display().to_string(),
            OutputTarget::Memory(_) => "memory".to_string(),
        }
    }
}

/// Shared in-memory file map keyed by `/`-separated relative paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, relative: &Path, contents: &[u8]) {
        let key = normalize(relative);
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, contents.to_vec());
    }

    /// Read a file by its URL-style path (`assets/css/app.css`); a leading
    /// `/` is ignored.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.trim_start_matches('/'))
            .cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path.trim_start_matches('/'))
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Copy of every file currently held.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
