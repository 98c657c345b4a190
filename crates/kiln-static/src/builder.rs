//! Static site builder.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use kiln_data::{build_data_tree, root_key, DataError};

use crate::assets::CopyRule;
use crate::bundle::{BundleDiagnostic, BundleOptions, Bundler, ScriptBundler, StyleBundler};
use crate::html::minify_html;
use crate::layout::{SourceLayout, TEMPLATE_EXTENSIONS};
use crate::output::OutputTarget;
use crate::templates::{PageContext, TemplateEngine};

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root (searched first for templates)
    pub project_dir: PathBuf,

    /// Source directory, relative to the project root or absolute
    pub src_dir: PathBuf,

    /// Where output files go
    pub output: OutputTarget,

    /// Production mode: minified styles and HTML
    pub production: bool,

    /// Base URL, exposed to templates as `root`
    pub base_url: String,

    /// Collapse HTML whitespace in production
    pub minify_html: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            src_dir: PathBuf::from("src"),
            output: OutputTarget::Disk(PathBuf::from("dist")),
            production: false,
            base_url: "/".to_string(),
            minify_html: true,
        }
    }
}

/// Result of a full build.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Number of pages rendered
    pub pages: usize,

    /// Number of images, fonts and static files copied
    pub assets: usize,

    /// Number of bundle artifacts written
    pub bundles: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Problems that did not stop the build
    pub problems: Vec<BuildError>,
}

impl BuildResult {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Outcome of a single build stage.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Files written by the stage
    pub written: usize,

    /// Problems that did not stop the stage
    pub problems: Vec<BuildError>,
}

impl StageReport {
    fn failed(problem: BuildError) -> Self {
        Self {
            written: 0,
            problems: vec![problem],
        }
    }

    fn merge(mut self, other: StageReport) -> Self {
        self.written += other.written;
        self.problems.extend(other.problems);
        self
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Data error: {0}")]
    DataError(#[from] DataError),

    #[error("Failed to render {path}: {message}")]
    TemplateError { path: PathBuf, message: String },

    #[error("Failed to bundle {bundler}: {diagnostic}")]
    BundleError {
        bundler: &'static str,
        diagnostic: BundleDiagnostic,
    },

    #[error("Failed to read {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

impl BuildError {
    /// Fatal errors mean the build cannot produce a usable site at all.
    pub fn is_fatal(&self) -> bool {
        match self {
            BuildError::SourceNotFound(_) | BuildError::WriteError(_) => true,
            BuildError::DataError(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
    layout: SourceLayout,
    styles: StyleBundler,
    scripts: ScriptBundler,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        let layout = SourceLayout::new(&config.project_dir, &config.src_dir);

        Self {
            config,
            layout,
            styles: StyleBundler::default(),
            scripts: ScriptBundler::default(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    pub fn output(&self) -> &OutputTarget {
        &self.config.output
    }

    /// Build the site: clean, then render pages, copy assets and bundle
    /// scripts and styles concurrently.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        if !self.layout.src_dir().is_dir() {
            return Err(BuildError::SourceNotFound(self.layout.src_dir().to_path_buf()));
        }

        self.clean()?;

        // Stages write to disjoint parts of the output.
        let (pages, (assets, bundles)) = rayon::join(
            || self.render_pages(),
            || rayon::join(|| self.copy_assets(), || self.bundle_assets()),
        );
        let (pages, assets, bundles) = (pages?, assets?, bundles?);

        let mut problems = pages.problems;
        problems.extend(assets.problems);
        problems.extend(bundles.problems);

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: pages.written,
            assets: assets.written,
            bundles: bundles.written,
            duration_ms: duration.as_millis() as u64,
            problems,
        })
    }

    /// Remove previous output.
    pub fn clean(&self) -> Result<(), BuildError> {
        tracing::debug!("Cleaning {}", self.config.output.describe());
        self.config
            .output
            .clean()
            .map_err(|e| BuildError::WriteError(e.to_string()))
    }

    /// Rebuild the data tree and render every page.
    ///
    /// A data error skips the whole pass; a template error skips one page.
    pub fn render_pages(&self) -> Result<StageReport, BuildError> {
        let data_dir = self.layout.data_dir();
        let data = match build_data_tree(&data_dir) {
            Ok(data) => data,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => return Ok(StageReport::failed(e.into())),
        };

        let context = PageContext {
            data_key: root_key(&data_dir),
            data,
            root: self.config.base_url.clone(),
        };
        let engine = TemplateEngine::new(&self.layout.template_roots());
        let pages = self.discover_pages();

        let results: Vec<Result<(), BuildError>> = pages
            .par_iter()
            .map(|page| self.render_page(&engine, &context, page))
            .collect();

        let mut report = StageReport::default();
        for result in results {
            match result {
                Ok(()) => report.written += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => report.problems.push(e),
            }
        }

        tracing::debug!("Rendered {} pages", report.written);

        Ok(report)
    }

    pub fn copy_images(&self) -> Result<StageReport, BuildError> {
        self.copy(CopyRule::images(&self.layout))
    }

    pub fn copy_fonts(&self) -> Result<StageReport, BuildError> {
        self.copy(CopyRule::fonts(&self.layout))
    }

    pub fn copy_static(&self) -> Result<StageReport, BuildError> {
        self.copy(CopyRule::static_files(&self.layout))
    }

    /// Copy images, fonts and static files.
    pub fn copy_assets(&self) -> Result<StageReport, BuildError> {
        Ok(self
            .copy_images()?
            .merge(self.copy_fonts()?)
            .merge(self.copy_static()?))
    }

    pub fn bundle_scripts(&self) -> Result<StageReport, BuildError> {
        self.run_bundler(&self.scripts, &self.layout.script_entry())
    }

    pub fn bundle_styles(&self) -> Result<StageReport, BuildError> {
        self.run_bundler(&self.styles, &self.layout.style_entry())
    }

    /// Bundle scripts and styles.
    pub fn bundle_assets(&self) -> Result<StageReport, BuildError> {
        Ok(self.bundle_scripts()?.merge(self.bundle_styles()?))
    }

    /// Find all pages, as paths relative to the source directory.
    fn discover_pages(&self) -> Vec<PathBuf> {
        let pages_dir = self.layout.pages_dir();

        if !pages_dir.is_dir() {
            tracing::warn!("Pages directory not found: {}", pages_dir.display());
            return Vec::new();
        }

        WalkDir::new(&pages_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("");
                TEMPLATE_EXTENSIONS.contains(&ext)
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(self.layout.src_dir())
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// Render one page (`pages/blog/post.njk`) to `blog/post.html`.
    fn render_page(
        &self,
        engine: &TemplateEngine,
        context: &PageContext,
        page: &Path,
    ) -> Result<(), BuildError> {
        let name = template_name(page);

        let html = engine
            .render_page(&name, context)
            .map_err(|e| BuildError::TemplateError {
                path: page.to_path_buf(),
                message: e.to_string(),
            })?;

        let html = if self.config.production && self.config.minify_html {
            minify_html(&html)
        } else {
            html
        };

        let output_path = page
            .strip_prefix("pages")
            .unwrap_or(page)
            .with_extension("html");

        self.config
            .output
            .write(&output_path, html.as_bytes())
            .map_err(|e| BuildError::WriteError(e.to_string()))
    }

    fn copy(&self, rule: CopyRule) -> Result<StageReport, BuildError> {
        match rule.copy(&self.config.output) {
            Ok(written) => Ok(StageReport {
                written,
                problems: Vec::new(),
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(StageReport::failed(e)),
        }
    }

    fn run_bundler(&self, bundler: &dyn Bundler, entry: &Path) -> Result<StageReport, BuildError> {
        if !entry.is_file() {
            tracing::debug!("No {} entry at {}", bundler.name(), entry.display());
            return Ok(StageReport::default());
        }

        let options = BundleOptions {
            production: self.config.production,
        };

        match bundler.bundle(entry, &options) {
            Ok(artifacts) => {
                for artifact in &artifacts {
                    self.config
                        .output
                        .write(&artifact.path, &artifact.contents)
                        .map_err(|e| BuildError::WriteError(e.to_string()))?;
                }
                tracing::debug!("Bundled {} {} artifacts", artifacts.len(), bundler.name());
                Ok(StageReport {
                    written: artifacts.len(),
                    problems: Vec::new(),
                })
            }
            Err(diagnostics) => Ok(StageReport {
                written: 0,
                problems: diagnostics
                    .into_iter()
                    .map(|diagnostic| BuildError::BundleError {
                        bundler: bundler.name(),
                        diagnostic,
                    })
                    .collect(),
            }),
        }
    }
}

/// Template names always use `/`, whatever the platform separator.
fn template_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
