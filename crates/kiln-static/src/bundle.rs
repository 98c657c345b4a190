//! Script and style bundling.

use std::collections::{HashSet, VecDeque};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Options shared by all bundlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleOptions {
    /// Produce minified output
    pub production: bool,
}

/// A file produced by a bundler.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Path relative to the output root
    pub path: PathBuf,

    /// File contents
    pub contents: Vec<u8>,
}

/// A compilation error reported by a bundler.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDiagnostic {
    /// File the error was found in
    pub file: PathBuf,

    /// Error message
    pub message: String,
}

impl BundleDiagnostic {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BundleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Trait for asset bundlers.
pub trait Bundler: Send + Sync {
    /// Bundler identifier (e.g., "styles", "scripts")
    fn name(&self) -> &'static str;

    /// Bundle `entry` and everything it imports.
    ///
    /// Returns every compilation error found, not just the first one.
    fn bundle(
        &self,
        entry: &Path,
        options: &BundleOptions,
    ) -> Result<Vec<Artifact>, Vec<BundleDiagnostic>>;
}

/// Bundles a CSS entry and its `@import`s with lightningcss.
#[derive(Debug, Clone)]
pub struct StyleBundler {
    out_dir: PathBuf,
}

impl StyleBundler {
    /// Create a bundler writing into `out_dir` (relative to the output root).
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl Default for StyleBundler {
    fn default() -> Self {
        Self::new("assets/css")
    }
}

impl Bundler for StyleBundler {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn bundle(
        &self,
        entry: &Path,
        options: &BundleOptions,
    ) -> Result<Vec<Artifact>, Vec<BundleDiagnostic>> {
        use lightningcss::bundler::{Bundler as CssBundler, FileProvider};
        use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};

        let fail = |message: String| vec![BundleDiagnostic::new(entry, message)];

        let provider = FileProvider::new();
        let mut bundler = CssBundler::new(&provider, None, ParserOptions::default());

        let mut stylesheet = bundler
            .bundle(entry)
            .map_err(|e| fail(format!("CSS bundle error: {}", e)))?;

        if options.production {
            stylesheet
                .minify(MinifyOptions::default())
                .map_err(|e| fail(format!("CSS minify error: {}", e)))?;
        }

        let css = stylesheet
            .to_css(PrinterOptions {
                minify: options.production,
                ..Default::default()
            })
            .map_err(|e| fail(format!("CSS print error: {}", e)))?;

        let file_name = entry.file_name().unwrap_or(OsStr::new("app.css"));

        Ok(vec![Artifact {
            path: self.out_dir.join(file_name),
            contents: css.code.into_bytes(),
        }])
    }
}

/// Collects an ES module graph, checking every module's syntax with oxc.
///
/// Modules reachable through relative static imports are emitted unchanged
/// beside the entry, preserving their layout. Bare specifiers are left for
/// the browser to resolve.
#[derive(Debug, Clone)]
pub struct ScriptBundler {
    out_dir: PathBuf,
}

impl ScriptBundler {
    /// Create a bundler writing into `out_dir` (relative to the output root).
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl Default for ScriptBundler {
    fn default() -> Self {
        Self::new("assets/js")
    }
}

impl Bundler for ScriptBundler {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn bundle(
        &self,
        entry: &Path,
        _options: &BundleOptions,
    ) -> Result<Vec<Artifact>, Vec<BundleDiagnostic>> {
        let entry = entry
            .canonicalize()
            .map_err(|e| vec![BundleDiagnostic::new(entry, e.to_string())])?;
        let root = entry.parent().unwrap_or(Path::new("/")).to_path_buf();

        let mut queue = VecDeque::from([entry]);
        let mut seen = HashSet::new();
        let mut artifacts = Vec::new();
        let mut diagnostics = Vec::new();

        while let Some(module) = queue.pop_front() {
            if !seen.insert(module.clone()) {
                continue;
            }

            let source = match fs::read_to_string(&module) {
                Ok(source) => source,
                Err(e) => {
                    diagnostics.push(BundleDiagnostic::new(&module, e.to_string()));
                    continue;
                }
            };

            match module_imports(&module, &source) {
                Ok(specifiers) => {
                    for specifier in specifiers {
                        if !is_relative(&specifier) {
                            tracing::debug!(
                                "Leaving bare import '{}' in {}",
                                specifier,
                                module.display()
                            );
                            continue;
                        }
                        match resolve(&module, &specifier) {
                            Some(resolved) => queue.push_back(resolved),
                            None => diagnostics.push(BundleDiagnostic::new(
                                &module,
                                format!("Cannot resolve '{}'", specifier),
                            )),
                        }
                    }
                }
                Err(errors) => diagnostics.extend(errors),
            }

            let Ok(relative) = module.strip_prefix(&root) else {
                diagnostics.push(BundleDiagnostic::new(
                    &module,
                    format!("Module is outside {}", root.display()),
                ));
                continue;
            };

            artifacts.push(Artifact {
                path: self.out_dir.join(relative),
                contents: source.into_bytes(),
            });
        }

        if diagnostics.is_empty() {
            Ok(artifacts)
        } else {
            Err(diagnostics)
        }
    }
}

/// Parse a module and return the specifiers of its static imports and re-exports.
fn module_imports(path: &Path, source: &str) -> Result<Vec<String>, Vec<BundleDiagnostic>> {
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    let ret = Parser::new(&allocator, source, source_type).parse();

    if !ret.errors.is_empty() {
        return Err(ret
            .errors
            .iter()
            .map(|e| BundleDiagnostic::new(path, e.to_string()))
            .collect());
    }

    let mut specifiers = Vec::new();
    for statement in &ret.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => specifiers.push(decl.source.value.to_string()),
            Statement::ExportAllDeclaration(decl) => {
                specifiers.push(decl.source.value.to_string())
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    specifiers.push(source.value.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(specifiers)
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve a relative specifier the way bundlers do: exact file, then with
/// `.js`/`.mjs` appended, then `index.js` inside a directory.
fn resolve(from: &Path, specifier: &str) -> Option<PathBuf> {
    let base = from.parent()?.join(specifier);
    let candidates = [
        base.clone(),
        PathBuf::from(format!("{}.js", base.display())),
        PathBuf::from(format!("{}.mjs", base.display())),
        base.join("index.js"),
    ];

    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .and_then(|candidate| candidate.canonicalize().ok())
}
