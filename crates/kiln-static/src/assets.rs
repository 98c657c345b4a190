//! Copying of images, fonts and static files into the output.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::builder::BuildError;
use crate::layout::{SourceLayout, FONT_EXTENSIONS, IMAGE_EXTENSIONS};
use crate::output::OutputTarget;

/// Copies the files of one source directory to one output directory.
#[derive(Debug, Clone)]
pub struct CopyRule {
    /// Source directory
    pub source: PathBuf,

    /// Destination, relative to the output root
    pub dest: PathBuf,

    /// Extensions to copy; `None` copies everything
    pub extensions: Option<&'static [&'static str]>,
}

impl CopyRule {
    /// `assets/images/**/*.{gif,png,jpg,jpeg,svg}` → `assets/images/`
    pub fn images(layout: &SourceLayout) -> Self {
        Self {
            source: layout.images_dir(),
            dest: PathBuf::from("assets/images"),
            extensions: Some(IMAGE_EXTENSIONS),
        }
    }

    /// `assets/fonts/**/*.{eot,ttf,svg,woff,woff2}` → `assets/fonts/`
    pub fn fonts(layout: &SourceLayout) -> Self {
        Self {
            source: layout.fonts_dir(),
            dest: PathBuf::from("assets/fonts"),
            extensions: Some(FONT_EXTENSIONS),
        }
    }

    /// `static/**/*` → `static/`
    pub fn static_files(layout: &SourceLayout) -> Self {
        Self {
            source: layout.static_dir(),
            dest: PathBuf::from("static"),
            extensions: None,
        }
    }

    /// Whether `path` should be copied by this rule.
    pub fn matches(&self, path: &Path) -> bool {
        match self.extensions {
            None => true,
            Some(extensions) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.contains(&ext)),
        }
    }

    /// Copy every matching file, returning how many were written.
    ///
    /// A missing source directory copies nothing.
    pub fn copy(&self, output: &OutputTarget) -> Result<usize, BuildError> {
        if !self.source.is_dir() {
            tracing::debug!("Nothing to copy from {}", self.source.display());
            return Ok(0);
        }

        let mut copied = 0;

        for entry in WalkDir::new(&self.source)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !self.matches(path) {
                continue;
            }

            let relative = path.strip_prefix(&self.source).unwrap_or(path);
            let contents = fs::read(path).map_err(|e| BuildError::ReadError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

            output
                .write(&self.dest.join(relative), &contents)
                .map_err(|e| BuildError::WriteError(e.to_string()))?;
            copied += 1;
        }

        tracing::debug!(
            "Copied {} files from {} to {}",
            copied,
            self.source.display(),
            self.dest.display()
        );

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn copies_matching_images_only() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path(), "src");
        write(&layout.images_dir(), "logo.png", b"png");
        write(&layout.images_dir(), "icons/star.svg", b"<svg/>");
        write(&layout.images_dir(), "draft.psd", b"psd");

        let memory = MemoryOutput::new();
        let copied = CopyRule::images(&layout)
            .copy(&OutputTarget::Memory(memory.clone()))
            .unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            memory.paths(),
            vec![
                "assets/images/icons/star.svg".to_string(),
                "assets/images/logo.png".to_string(),
            ]
        );
    }

    #[test]
    fn copies_every_static_file() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path(), "src");
        write(&layout.static_dir(), "robots.txt", b"User-agent: *");
        write(&layout.static_dir(), "docs/guide.pdf", b"%PDF");

        let memory = MemoryOutput::new();
        let copied = CopyRule::static_files(&layout)
            .copy(&OutputTarget::Memory(memory.clone()))
            .unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            memory.read("static/robots.txt"),
            Some(b"User-agent: *".to_vec())
        );
    }

    #[test]
    fn missing_source_copies_nothing() {
        let temp = tempdir().unwrap();
        let layout = SourceLayout::new(temp.path(), "src");

        let copied = CopyRule::fonts(&layout)
            .copy(&OutputTarget::Memory(MemoryOutput::new()))
            .unwrap();

        assert_eq!(copied, 0);
    }

    #[test]
    fn font_rule_accepts_svg_fonts() {
        let rule = CopyRule::fonts(&SourceLayout::default());

        assert!(rule.matches(Path::new("icons.svg")));
        assert!(rule.matches(Path::new("inter.woff2")));
        assert!(!rule.matches(Path::new("inter.otf")));
    }
}
