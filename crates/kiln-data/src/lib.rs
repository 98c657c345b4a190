//! Data tree builder for kiln.
//!
//! Turns a directory of JSON files into a single nested tree whose keys
//! mirror the directory structure, for use as template rendering context.

pub mod scan;
pub mod tree;

pub use scan::{build_data_tree, root_key, scan, DataError, FileEntry};
pub use tree::{DataNode, DataTree};
