//! Development server implementation.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use percent_encoding::percent_decode_str;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

use kiln_static::MemoryOutput;

use crate::rebuild::Rebuilder;
use crate::websocket::{
    reload_client_script, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH, RELOAD_SOCKET_PATH,
};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,

    /// Inject the live-reload client into served pages
    pub live_reload: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: true,
            live_reload: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
#[derive(Clone)]
struct ServerState {
    output: MemoryOutput,
    hub: ReloadHub,
    live_reload: bool,
}

/// Development server serving a build held in memory.
pub struct DevServer {
    config: DevServerConfig,
    output: MemoryOutput,
    hub: ReloadHub,
    rebuilder: Option<Rebuilder>,
}

impl DevServer {
    /// Create a new development server for `output`.
    pub fn new(config: DevServerConfig, output: MemoryOutput) -> Self {
        Self {
            config,
            output,
            hub: ReloadHub::new(),
            rebuilder: None,
        }
    }

    /// Rebuild on source changes while serving, reloading connected pages.
    pub fn with_rebuilder(mut self, rebuilder: Rebuilder) -> Self {
        self.rebuilder = Some(rebuilder.with_hub(self.hub.clone()));
        self
    }

    /// The hub used to notify connected browsers.
    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        let state = ServerState {
            output: self.output.clone(),
            hub: self.hub.clone(),
            live_reload: self.config.live_reload,
        };

        Router::new()
            .route(RELOAD_SOCKET_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .fallback(file_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let raw = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = raw
            .parse()
            .map_err(|_| ServerError::InvalidAddress(raw.clone()))?;

        let app = self.router();

        // Keep the watch task alive as long as the server runs
        let _watch = match self.rebuilder {
            Some(rebuilder) => Some(rebuilder.spawn()?),
            None => None,
        };

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} files at {}", self.output.len(), url);

        // Open browser if configured
        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Serve a file from the in-memory build.
async fn file_handler(State(state): State<ServerState>, uri: Uri) -> Response {
    let Some((path, body)) = lookup(&state.output, uri.path()) else {
        return (StatusCode::NOT_FOUND, Html("<h1>404 Not Found</h1>")).into_response();
    };

    let content_type = content_type(&path);
    let body = if state.live_reload && content_type.starts_with("text/html") {
        inject_reload_script(&String::from_utf8_lossy(&body)).into_bytes()
    } else {
        body
    };

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Find the output file for a percent-encoded request path, falling back to
/// `index.html` for directories.
fn lookup(output: &MemoryOutput, request_path: &str) -> Option<(String, Vec<u8>)> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let trimmed = decoded.trim_start_matches('/');

    let candidates = if trimmed.is_empty() || trimmed.ends_with('/') {
        vec![format!("{trimmed}index.html")]
    } else {
        vec![trimmed.to_string(), format!("{trimmed}/index.html")]
    };

    candidates
        .into_iter()
        .find_map(|candidate| output.read(&candidate).map(|body| (candidate, body)))
}

fn content_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Insert the live-reload client before the closing body tag.
fn inject_reload_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH);

    match html.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    // Forward reload messages to the client
    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client skipped {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Handler for the live-reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        reload_client_script(),
    )
}
