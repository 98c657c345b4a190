//! Project configuration (kiln.toml).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct SiteConfig {
    /// Source directory, relative to the project
    #[serde(default = "default_src")]
    pub src: String,
    /// Output directory for disk builds
    #[serde(default = "default_dist")]
    pub dist: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Open a browser when serving
    #[serde(default = "default_true")]
    pub open: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct BuildSettings {
    /// Collapse HTML whitespace in production builds
    #[serde(default = "default_true")]
    pub minify_html: bool,
    /// Send desktop notifications for build problems
    #[serde(default = "default_true")]
    pub notify: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
            base_url: default_base_url(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: true,
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify_html: true,
            notify: true,
        }
    }
}

fn default_src() -> String {
    "src".to_string()
}
fn default_dist() -> String {
    "dist".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_true() -> bool {
    true
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}
