//! Source directory layout of a kiln project.
//!
//! ```text
//! project/
//! ├── kiln.toml
//! └── src/
//!     ├── pages/        # *.njk, *.htm, *.html, one output page each
//!     ├── layouts/      # templates extended by pages
//!     ├── partials/
//!     ├── components/
//!     ├── data/         # *.json, the data tree
//!     ├── assets/
//!     │   ├── js/app.js     # script entry
//!     │   ├── css/app.css   # style entry
//!     │   ├── images/
//!     │   └── fonts/
//!     └── static/       # copied verbatim
//! ```

use std::fs;
use std::path::{Path, PathBuf};

/// Extensions of page, layout, partial and component templates.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["njk", "htm", "html"];

/// Extensions copied from `assets/images`.
pub const IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "svg"];

/// Extensions copied from `assets/fonts`.
pub const FONT_EXTENSIONS: &[&str] = &["eot", "ttf", "svg", "woff", "woff2"];

const TEMPLATE_DIRS: &[&str] = &["pages", "layouts", "partials", "components"];

/// What a source file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Template,
    Data,
    Font,
    Image,
    Static,
    Script,
    Style,
}

/// Paths of the well-known directories under a project's source directory.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    project_dir: PathBuf,
    src_dir: PathBuf,
}

impl SourceLayout {
    /// Create a layout. A relative `src_dir` is resolved against `project_dir`.
    ///
    /// Both directories are stored as absolute paths so they compare equal to
    /// the paths reported by the file watcher.
    pub fn new(project_dir: impl Into<PathBuf>, src_dir: impl AsRef<Path>) -> Self {
        let project_dir = absolute(project_dir.into());
        let src_dir = absolute(project_dir.join(src_dir));
        Self {
            project_dir,
            src_dir,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.src_dir.join("pages")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.src_dir.join("data")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.src_dir.join("assets").join("images")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.src_dir.join("assets").join("fonts")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.src_dir.join("static")
    }

    pub fn script_entry(&self) -> PathBuf {
        self.src_dir.join("assets").join("js").join("app.js")
    }

    pub fn style_entry(&self) -> PathBuf {
        self.src_dir.join("assets").join("css").join("app.css")
    }

    /// Directories searched when a template names another template, in order.
    pub fn template_roots(&self) -> Vec<PathBuf> {
        vec![self.project_dir.clone(), self.src_dir.clone()]
    }

    /// Classify a changed path. Returns `None` for paths no build stage reads.
    pub fn classify(&self, path: &Path) -> Option<SourceKind> {
        let relative = path.strip_prefix(&self.src_dir).ok()?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let top = relative.components().next()?.as_os_str().to_str()?;

        match top {
            dir if TEMPLATE_DIRS.contains(&dir) && TEMPLATE_EXTENSIONS.contains(&ext) => {
                Some(SourceKind::Template)
            }
            "data" if ext == "json" => Some(SourceKind::Data),
            "static" => Some(SourceKind::Static),
            "assets" => {
                let assets = relative.strip_prefix("assets").ok()?;
                if assets.starts_with("fonts") && FONT_EXTENSIONS.contains(&ext) {
                    Some(SourceKind::Font)
                } else if assets.starts_with("images") && IMAGE_EXTENSIONS.contains(&ext) {
                    Some(SourceKind::Image)
                } else if assets.starts_with("js") && (ext == "js" || ext == "mjs") {
                    Some(SourceKind::Script)
                } else if assets.starts_with("css") && ext == "css" {
                    Some(SourceKind::Style)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Canonical form of `path`, or the absolute form when it does not exist yet.
fn absolute(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path)
        .or_else(|_| std::path::absolute(&path))
        .unwrap_or(path)
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self::new(".", "src")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SourceLayout {
        SourceLayout::new("/site", "src")
    }

    #[test]
    fn resolves_well_known_paths() {
        let layout = layout();

        assert_eq!(layout.src_dir(), Path::new("/site/src"));
        assert_eq!(layout.data_dir(), PathBuf::from("/site/src/data"));
        assert_eq!(
            layout.script_entry(),
            PathBuf::from("/site/src/assets/js/app.js")
        );
        assert_eq!(
            layout.template_roots(),
            vec![PathBuf::from("/site"), PathBuf::from("/site/src")]
        );
    }

    #[test]
    fn relative_dirs_become_absolute() {
        let layout = SourceLayout::new(".", "src");
        let cwd = fs::canonicalize(".").unwrap();

        assert!(layout.project_dir().is_absolute());
        assert_eq!(layout.src_dir(), cwd.join("src"));
        assert_eq!(
            layout.classify(&cwd.join("src/pages/index.njk")),
            Some(SourceKind::Template)
        );
    }

    #[test]
    fn classifies_templates_and_data() {
        let layout = layout();

        assert_eq!(
            layout.classify(Path::new("/site/src/pages/index.njk")),
            Some(SourceKind::Template)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/partials/nav/menu.html")),
            Some(SourceKind::Template)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/data/site/title.json")),
            Some(SourceKind::Data)
        );
        assert_eq!(layout.classify(Path::new("/site/src/pages/notes.txt")), None);
    }

    #[test]
    fn classifies_assets() {
        let layout = layout();

        assert_eq!(
            layout.classify(Path::new("/site/src/assets/fonts/inter.woff2")),
            Some(SourceKind::Font)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/assets/images/logo.svg")),
            Some(SourceKind::Image)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/assets/js/lib/util.js")),
            Some(SourceKind::Script)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/assets/css/base.css")),
            Some(SourceKind::Style)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/static/robots.txt")),
            Some(SourceKind::Static)
        );
        assert_eq!(
            layout.classify(Path::new("/site/src/assets/images/raw.psd")),
            None
        );
    }

    #[test]
    fn ignores_paths_outside_source() {
        let layout = layout();

        assert_eq!(layout.classify(Path::new("/site/dist/index.html")), None);
        assert_eq!(layout.classify(Path::new("/site/src")), None);
    }
}
