//! Build pipeline for kiln sites.
//!
//! Renders pages with a data tree built from JSON files, copies static
//! assets and bundles scripts and styles into an output target.

pub mod assets;
pub mod builder;
pub mod bundle;
pub mod html;
pub mod layout;
pub mod notifier;
pub mod output;
pub mod templates;

pub use builder::{BuildConfig, BuildError, BuildResult, StageReport, StaticBuilder};
pub use bundle::{Artifact, BundleDiagnostic, BundleOptions, Bundler, ScriptBundler, StyleBundler};
pub use layout::{SourceKind, SourceLayout};
pub use notifier::{report_problems, DesktopNotifier, Notification, Notifier, SilentNotifier};
pub use output::{MemoryOutput, OutputTarget};
