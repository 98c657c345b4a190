//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live-reload WebSocket endpoint.
pub const RELOAD_SOCKET_PATH: &str = "/__livereload";

/// Path of the live-reload client script.
pub const RELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to clients for live reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Re-fetch stylesheets without reloading the page
    ReloadCss,

    /// A rebuild failed; the page keeps showing the last good output
    BuildFailed {
        /// Human-readable error summary
        message: String,
    },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new reload hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the client-side live-reload script.
///
/// The socket URL is derived from the page's own host, so the script works
/// on whatever address the server is bound to.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
  const url = protocol + '//' + location.host + '{}';

  function connect() {{
    const ws = new WebSocket(url);

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;

        case 'reload_css':
          document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {{
            const href = link.href.replace(/[?&]livereload=\d+/, '');
            link.href = href + (href.indexOf('?') === -1 ? '?' : '&') + 'livereload=' + Date.now();
          }});
          break;

        case 'build_failed':
          console.error('[kiln] Build failed:\n' + msg.message);
          break;

        case 'connected':
          console.log('[kiln] Live reload connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      // Server restarted or went away: wait for it, then reload.
      setTimeout(function() {{
        fetch(location.href, {{ method: 'HEAD' }})
          .then(function() {{ location.reload(); }})
          .catch(connect);
      }}, 1000);
    }};
  }}

  connect();
}})();
"#,
        RELOAD_SOCKET_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Reload);

        match rx.try_recv() {
            Ok(ReloadMessage::Reload) => {}
            other => panic!("Expected Reload message, got {other:?}"),
        }
    }

    #[test]
    fn send_without_subscribers_is_harmless() {
        let hub = ReloadHub::new();

        hub.send(ReloadMessage::ReloadCss);

        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn serializes_messages() {
        let msg = ReloadMessage::BuildFailed {
            message: "Invalid JSON in data/site.json".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains(r#""type":"build_failed""#));
        assert!(json.contains("data/site.json"));
        assert_eq!(
            serde_json::to_string(&ReloadMessage::ReloadCss).unwrap(),
            r#"{"type":"reload_css"}"#
        );
    }

    #[test]
    fn client_script_uses_socket_path() {
        let script = reload_client_script();

        assert!(script.contains(RELOAD_SOCKET_PATH));
        assert!(script.contains("reload_css"));
    }
}
