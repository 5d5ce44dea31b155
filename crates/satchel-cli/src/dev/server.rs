//! Development server with reload via Server-Sent Events.
//!
//! Serves the last good build from the memory cache, falling back to the
//! output directory on disk.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use crate::dev::state::url_prefix;
use crate::dev::{DevEvent, SharedState, error_overlay};
use crate::error::{CliError, Result, ResultExt};
use crate::ui;

pub const SSE_PATH: &str = "/__satchel_sse__";
pub const RELOAD_SCRIPT_PATH: &str = "/__satchel_reload__.js";

const RELOAD_SCRIPT: &str = include_str!("../../assets/dev/reload-client.js");

/// A bound development server, ready to run.
pub struct DevServer {
    listener: TcpListener,
    state: SharedState,
}

impl DevServer {
    /// Bind the listening socket. Failing here keeps `serve` from starting
    /// a watcher for a server that never came up.
    pub async fn bind(host: &str, port: u16, state: SharedState) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .context(format!("Failed to bind to {host}:{port}"))
            .with_hint("Pick a free port with --port or stop whatever is listening there")?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn url(&self) -> Result<String> {
        Ok(format!("http://{}", self.local_addr()?))
    }

    pub async fn run(self) -> Result<()> {
        let app = router(self.state);
        axum::serve(self.listener, app)
            .await
            .map_err(|e| CliError::Server(format!("Server error: {e}")))
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(SSE_PATH, get(handle_sse))
        .route(RELOAD_SCRIPT_PATH, get(handle_reload_script))
        .route("/favicon.ico", get(handle_favicon))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn handle_sse(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = state.register_client();
    debug!("SSE client {} connected", id);
    state.broadcast(&DevEvent::ClientConnected { id });

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_reload_script() -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        RELOAD_SCRIPT,
    )
        .into_response()
}

async fn handle_favicon(State(state): State<SharedState>, uri: Uri) -> Response {
    match serve_built(&state, uri.path()).await {
        Some(response) => response,
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Everything else: a built file, or the overlay while the build is broken.
async fn handle_request(State(state): State<SharedState>, uri: Uri) -> Response {
    let path = uri.path();

    let status = state.get_status();
    if let Some(error) = status.error() {
        if is_document_request(path) {
            return html_response(error_overlay::generate_error_overlay(error).into_bytes());
        }
    }

    match serve_built(&state, path).await {
        Some(response) => response,
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("File not found: {path}"),
        )
            .into_response(),
    }
}

async fn serve_built(state: &SharedState, path: &str) -> Option<Response> {
    if let Some((content, content_type)) = state.get_cached_file(path) {
        return Some(file_response(content, &content_type));
    }

    let file_path = disk_path(state.out_dir(), url_prefix(state.public_path()), path)?;
    match tokio::fs::read(&file_path).await {
        Ok(content) => {
            let content_type = mime_guess::from_path(&file_path)
                .first_or_octet_stream()
                .to_string();
            Some(file_response(content, &content_type))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            ui::warning(&format!("Failed to read {}: {}", file_path.display(), e));
            None
        }
    }
}

fn file_response(content: Vec<u8>, content_type: &str) -> Response {
    if content_type.starts_with("text/html") {
        return html_response(inject_reload_script(&content));
    }
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        content,
    )
        .into_response()
}

fn html_response(body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Map a URL path to a file under the output directory. Paths outside the
/// public path or with `..` segments map to nothing.
fn disk_path(out_dir: &Path, prefix: &str, url_path: &str) -> Option<PathBuf> {
    let rel = url_path.strip_prefix(prefix)?;
    let rel = if rel.is_empty() || rel.ends_with('/') {
        format!("{rel}index.html")
    } else {
        rel.to_string()
    };

    let rel = Path::new(&rel);
    if !rel
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(out_dir.join(rel))
}

/// Page navigations, as opposed to asset fetches.
fn is_document_request(path: &str) -> bool {
    path.ends_with('/')
        || path.ends_with(".html")
        || Path::new(path).extension().is_none()
}

/// Add the reload client before `</body>`, or at the end.
fn inject_reload_script(content: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(content);
    let script_tag = format!(r#"<script src="{RELOAD_SCRIPT_PATH}"></script>"#);

    match html.rfind("</body>") {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + script_tag.len() + 4);
            result.push_str(&html[..pos]);
            result.push_str(&script_tag);
            result.push('\n');
            result.push_str(&html[pos..]);
            result.into_bytes()
        }
        None => format!("{html}\n{script_tag}").into_bytes(),
    }
}
