//! File watching for rebuilds.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use kiln_static::{SourceKind, SourceLayout};

/// Quiet period after the last change before events are delivered.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher, one per build stage to re-run.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A page, layout, partial, component or data file changed
    Templates(PathBuf),

    /// A font changed
    Fonts(PathBuf),

    /// An image changed
    Images(PathBuf),

    /// A static file changed
    Static(PathBuf),

    /// A script module changed
    Scripts(PathBuf),

    /// A stylesheet changed
    Styles(PathBuf),
}

impl WatchEvent {
    /// Build the event for a path of the given kind.
    pub fn new(kind: SourceKind, path: PathBuf) -> Self {
        match kind {
            SourceKind::Template | SourceKind::Data => WatchEvent::Templates(path),
            SourceKind::Font => WatchEvent::Fonts(path),
            SourceKind::Image => WatchEvent::Images(path),
            SourceKind::Static => WatchEvent::Static(path),
            SourceKind::Script => WatchEvent::Scripts(path),
            SourceKind::Style => WatchEvent::Styles(path),
        }
    }

    /// The changed path that triggered the event.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Templates(path)
            | WatchEvent::Fonts(path)
            | WatchEvent::Images(path)
            | WatchEvent::Static(path)
            | WatchEvent::Scripts(path)
            | WatchEvent::Styles(path) => path,
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the source directory of `layout`.
    ///
    /// Returns the watcher and a channel to receive events. Events stop when
    /// the watcher is dropped.
    pub fn new(
        layout: &SourceLayout,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(layout.src_dir(), RecursiveMode::Recursive)
            .map_err(std::io::Error::other)?;

        let layout = layout.clone();
        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                // Gather the burst, then emit one event per stage.
                let mut pending = Vec::new();
                collect(&layout, first, &mut pending);
                while let Ok(event) = sync_rx.recv_timeout(DEBOUNCE) {
                    collect(&layout, event, &mut pending);
                }

                for event in pending {
                    if async_tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event and queue it unless its stage is already pending.
fn collect(layout: &SourceLayout, event: notify::Event, pending: &mut Vec<WatchEvent>) {
    if !is_change(&event.kind) {
        return;
    }

    for path in event.paths {
        let Some(watch_event) = classify_event(layout, &path) else {
            continue;
        };
        let stage = mem::discriminant(&watch_event);
        if !pending.iter().any(|e| mem::discriminant(e) == stage) {
            pending.push(watch_event);
        }
    }
}

fn is_change(kind: &notify::EventKind) -> bool {
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Classify a changed path into a WatchEvent.
fn classify_event(layout: &SourceLayout, path: &Path) -> Option<WatchEvent> {
    layout
        .classify(path)
        .map(|kind| WatchEvent::new(kind, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn data_changes_rerender_templates() {
        let layout = SourceLayout::new("/site", "src");

        assert_eq!(
            classify_event(&layout, Path::new("/site/src/data/nav.json")),
            Some(WatchEvent::Templates(PathBuf::from("/site/src/data/nav.json")))
        );
        assert_eq!(
            classify_event(&layout, Path::new("/site/src/assets/css/app.css")),
            Some(WatchEvent::Styles(PathBuf::from("/site/src/assets/css/app.css")))
        );
        assert_eq!(classify_event(&layout, Path::new("/site/README.md")), None);
    }

    #[test]
    fn bursts_collapse_to_one_event_per_stage() {
        let layout = SourceLayout::new("/site", "src");
        let mut pending = Vec::new();

        let event = notify::Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/site/src/pages/a.njk"))
            .add_path(PathBuf::from("/site/src/data/b.json"))
            .add_path(PathBuf::from("/site/src/static/c.txt"));
        collect(&layout, event, &mut pending);

        assert_eq!(
            pending,
            vec![
                WatchEvent::Templates(PathBuf::from("/site/src/pages/a.njk")),
                WatchEvent::Static(PathBuf::from("/site/src/static/c.txt")),
            ]
        );
    }

    #[test]
    fn ignores_access_events() {
        let layout = SourceLayout::new("/site", "src");
        let mut pending = Vec::new();

        let event = notify::Event::new(notify::EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/site/src/pages/a.njk"));
        collect(&layout, event, &mut pending);

        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("src/pages")).unwrap();
        let layout = SourceLayout::new(&root, "src");

        // Create the watcher first (so it catches file creation)
        let (watcher, mut rx) = FileWatcher::new(&layout).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(root.join("src/pages/index.njk"), "<h1>Created</h1>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        // Keep watcher alive until we're done
        drop(watcher);

        let event = event.expect("timeout waiting for file watch event");
        assert!(matches!(event, Some(WatchEvent::Templates(_))));
    }

    #[tokio::test]
    async fn watches_relative_source_dir() {
        // Relative to the working directory, like the CLI's default `./src`.
        let temp = tempfile::Builder::new()
            .prefix("kiln-watch-")
            .tempdir_in(".")
            .unwrap();
        let src = PathBuf::from(temp.path().file_name().unwrap());
        fs::create_dir_all(src.join("pages")).unwrap();
        let layout = SourceLayout::new(".", &src);

        let (watcher, mut rx) = FileWatcher::new(&layout).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(src.join("pages/index.njk"), "<h1>Created</h1>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let event = event.expect("timeout waiting for file watch event");
        assert!(matches!(event, Some(WatchEvent::Templates(_))));
    }
}
