//! Development server with live reload for kiln sites.
//!
//! Serves a build held in memory, watches the source directory, re-runs the
//! affected build stage on change and reloads connected browsers over a
//! WebSocket.

pub mod rebuild;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use rebuild::{run_stage, Rebuilder};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{ReloadHub, ReloadMessage};
