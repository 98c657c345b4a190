//! Incremental rebuilds driven by file changes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kiln_static::{report_problems, BuildError, Notifier, StageReport, StaticBuilder};

use crate::server::ServerError;
use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{ReloadHub, ReloadMessage};

/// Re-runs the build stage for each watch event and tells browsers about it.
#[derive(Clone)]
pub struct Rebuilder {
    builder: Arc<StaticBuilder>,
    notifier: Arc<dyn Notifier>,
    hub: Option<ReloadHub>,
}

impl Rebuilder {
    pub fn new(builder: Arc<StaticBuilder>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            builder,
            notifier,
            hub: None,
        }
    }

    /// Broadcast reload messages through `hub` after each rebuild.
    pub fn with_hub(mut self, hub: ReloadHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn builder(&self) -> &StaticBuilder {
        &self.builder
    }

    /// Rebuild the stage affected by `event`.
    ///
    /// Problems are logged and notified; the previous output of the stage is
    /// left in place when it fails.
    pub async fn handle(&self, event: WatchEvent) {
        tracing::info!("Changed: {}", event.path().display());

        let builder = Arc::clone(&self.builder);
        let stage = event.clone();
        let outcome = tokio::task::spawn_blocking(move || run_stage(&builder, &stage)).await;

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(fatal)) => StageReport {
                written: 0,
                problems: vec![fatal],
            },
            Err(e) => {
                tracing::error!("Rebuild task failed: {}", e);
                return;
            }
        };

        if !report.problems.is_empty() {
            report_problems(&report.problems, self.notifier.as_ref());
            self.broadcast(ReloadMessage::BuildFailed {
                message: summarize(&report.problems),
            });
            return;
        }

        tracing::debug!("Rebuilt {} file(s)", report.written);
        match event {
            WatchEvent::Styles(_) => self.broadcast(ReloadMessage::ReloadCss),
            _ => self.broadcast(ReloadMessage::Reload),
        }
    }

    /// Handle events one at a time until the channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
    }

    /// Start watching the source directory in a background task.
    pub fn spawn(self) -> Result<JoinHandle<()>, ServerError> {
        let (watcher, rx) = FileWatcher::new(self.builder.layout())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        tracing::info!(
            "Watching {} for changes",
            self.builder.layout().src_dir().display()
        );

        Ok(tokio::spawn(async move {
            self.run(rx).await;
            // Keep watcher alive
            drop(watcher);
        }))
    }

    /// Watch the source directory until the watcher stops.
    pub async fn watch(self) -> Result<(), ServerError> {
        self.spawn()?
            .await
            .map_err(|e| ServerError::WatchError(e.to_string()))
    }

    fn broadcast(&self, msg: ReloadMessage) {
        if let Some(hub) = &self.hub {
            hub.send(msg);
        }
    }
}

/// Run the build stage matching `event`.
pub fn run_stage(builder: &StaticBuilder, event: &WatchEvent) -> Result<StageReport, BuildError> {
    match event {
        WatchEvent::Templates(_) => builder.render_pages(),
        WatchEvent::Fonts(_) => builder.copy_fonts(),
        WatchEvent::Images(_) => builder.copy_images(),
        WatchEvent::Static(_) => builder.copy_static(),
        WatchEvent::Scripts(_) => builder.bundle_scripts(),
        WatchEvent::Styles(_) => builder.bundle_styles(),
    }
}

fn summarize(problems: &[BuildError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use kiln_static::{BuildConfig, MemoryOutput, Notification, OutputTarget};
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.sent.lock().unwrap().push(notification.clone());
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn project() -> TempDir {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "pages/index.njk", "<h1>{{ data.site.title }}</h1>");
        write(&src, "data/site/title.json", "\"Hello\"");
        write(&src, "assets/css/app.css", "body { margin: 0; }");
        write(&src, "static/robots.txt", "User-agent: *");
        temp
    }

    fn rebuilder(
        temp: &TempDir,
        output: &MemoryOutput,
    ) -> (Rebuilder, Arc<RecordingNotifier>, ReloadHub) {
        let builder = StaticBuilder::new(BuildConfig {
            project_dir: temp.path().to_path_buf(),
            output: OutputTarget::Memory(output.clone()),
            ..BuildConfig::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let hub = ReloadHub::new();
        let rebuilder = Rebuilder::new(Arc::new(builder), notifier.clone() as Arc<dyn Notifier>)
            .with_hub(hub.clone());
        (rebuilder, notifier, hub)
    }

    #[tokio::test]
    async fn data_change_rerenders_pages() {
        let temp = project();
        let output = MemoryOutput::new();
        let (rebuilder, notifier, hub) = rebuilder(&temp, &output);
        let mut rx = hub.subscribe();

        let changed = write(&temp.path().join("src"), "data/site/title.json", "\"Changed\"");
        rebuilder.handle(WatchEvent::Templates(changed)).await;

        assert_eq!(output.read("index.html").unwrap(), b"<h1>Changed</h1>");
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn style_change_reloads_css_only() {
        let temp = project();
        let output = MemoryOutput::new();
        let (rebuilder, _notifier, hub) = rebuilder(&temp, &output);
        let mut rx = hub.subscribe();

        let path = temp.path().join("src/assets/css/app.css");
        rebuilder.handle(WatchEvent::Styles(path)).await;

        assert!(output.contains("assets/css/app.css"));
        assert!(!output.contains("index.html"));
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::ReloadCss);
    }

    #[tokio::test]
    async fn broken_data_keeps_watching() {
        let temp = project();
        let output = MemoryOutput::new();
        let (rebuilder, notifier, hub) = rebuilder(&temp, &output);
        let mut rx = hub.subscribe();

        let broken = write(&temp.path().join("src"), "data/site/title.json", "{ nope");
        rebuilder.handle(WatchEvent::Templates(broken)).await;

        assert!(!output.contains("index.html"));
        match rx.try_recv().unwrap() {
            ReloadMessage::BuildFailed { message } => assert!(message.contains("title.json")),
            other => panic!("Expected BuildFailed, got {other:?}"),
        }
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        // Fixing the file recovers on the next event.
        let fixed = write(&temp.path().join("src"), "data/site/title.json", "\"Fixed\"");
        rebuilder.handle(WatchEvent::Templates(fixed)).await;

        assert_eq!(output.read("index.html").unwrap(), b"<h1>Fixed</h1>");
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn fatal_stage_errors_are_reported() {
        let temp = project();
        let output = MemoryOutput::new();
        let (rebuilder, notifier, hub) = rebuilder(&temp, &output);
        let mut rx = hub.subscribe();

        let data_dir = temp.path().join("src/data");
        fs::remove_dir_all(&data_dir).unwrap();
        rebuilder.handle(WatchEvent::Templates(data_dir)).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            ReloadMessage::BuildFailed { .. }
        ));
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn runs_events_in_order() {
        let temp = project();
        let output = MemoryOutput::new();
        let (rebuilder, _notifier, hub) = rebuilder(&temp, &output);
        let mut rx = hub.subscribe();

        let (tx, events) = mpsc::channel(4);
        tx.send(WatchEvent::Static(temp.path().join("src/static/robots.txt")))
            .await
            .unwrap();
        tx.send(WatchEvent::Styles(temp.path().join("src/assets/css/app.css")))
            .await
            .unwrap();
        drop(tx);

        rebuilder.run(events).await;

        assert!(output.contains("static/robots.txt"));
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::ReloadCss);
    }
}
