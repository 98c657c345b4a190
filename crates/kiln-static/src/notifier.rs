//! Best-effort desktop notifications for build problems.

use std::process::{Command, Stdio};

use crate::builder::BuildError;

/// A message shown to the developer.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Fire-and-forget notification delivery. Implementations must never fail
/// or panic.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Sends notifications through `notify-send` (Linux) or `osascript` (macOS).
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }

    fn command(notification: &Notification) -> Option<Command> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\" sound name \"default\"",
                applescript_escape(&notification.message),
                applescript_escape(&notification.title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Some(cmd)
        } else if cfg!(unix) {
            let mut cmd = Command::new("notify-send");
            cmd.arg(&notification.title).arg(&notification.message);
            Some(cmd)
        } else {
            None
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) {
        let Some(mut cmd) = Self::command(notification) else {
            return;
        };

        match cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                // Reap in the background so the caller never waits.
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => tracing::debug!("Desktop notification unavailable: {}", e),
        }
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _notification: &Notification) {}
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Log every problem and send a single notification summarizing them.
pub fn report_problems(problems: &[BuildError], notifier: &dyn Notifier) {
    if problems.is_empty() {
        return;
    }

    for problem in problems {
        tracing::error!("{}", problem);
    }

    let message = problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    notifier.notify(&Notification::new("Error in console", message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records notifications for assertions.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.sent.lock().unwrap().push(notification.clone());
        }
    }

    #[test]
    fn reports_problems_in_one_notification() {
        let notifier = RecordingNotifier::default();
        let problems = vec![
            BuildError::TemplateError {
                path: PathBuf::from("pages/index.njk"),
                message: "unexpected end of input".to_string(),
            },
            BuildError::WriteError("disk full".to_string()),
        ];

        report_problems(&problems, &notifier);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Error in console");
        assert!(sent[0].message.contains("pages/index.njk"));
        assert!(sent[0].message.contains("disk full"));
    }

    #[test]
    fn stays_quiet_without_problems() {
        let notifier = RecordingNotifier::default();

        report_problems(&[], &notifier);

        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn escapes_applescript_strings() {
        assert_eq!(applescript_escape(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }

    #[test]
    fn silent_notifier_accepts_anything() {
        SilentNotifier.notify(&Notification::new("title", "message"));
    }
}
