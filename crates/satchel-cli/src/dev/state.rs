//! Shared state for the development server.
//!
//! Build status, the in-memory copy of the last good build and the SSE
//! client registry, behind parking_lot locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use satchel_bundler::OutputFile;
use tokio::sync::mpsc;

use crate::dev::DevEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64 },
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    /// Error message if the last build failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Output of the last good build, keyed by URL path.
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    /// url path -> (content, content-type)
    files: HashMap<String, (Vec<u8>, String)>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache every written file under `public_path`.
    pub fn from_files(files: &[OutputFile], public_path: &str) -> Self {
        let mut cache = Self::new();
        let prefix = url_prefix(public_path);
        for file in files {
            let content_type = mime_guess::from_path(&file.path)
                .first_or_octet_stream()
                .to_string();
            cache.insert(format!("{prefix}{}", file.path), file.bytes.clone(), content_type);
        }
        cache
    }

    pub fn insert(&mut self, path: String, content: Vec<u8>, content_type: String) {
        self.files.insert(path, (content, content_type));
    }

    /// Exact match, or `index.html` for directory URLs.
    pub fn get(&self, path: &str) -> Option<&(Vec<u8>, String)> {
        self.files.get(path).or_else(|| {
            path.ends_with('/')
                .then(|| self.files.get(&format!("{path}index.html")))
                .flatten()
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// URL path prefix of the public path; absolute URLs (a CDN) are served
/// from the root.
pub(crate) fn url_prefix(public_path: &str) -> &str {
    if public_path.starts_with('/') {
        public_path
    } else {
        "/"
    }
}

pub type ClientRegistry = Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>;

pub struct DevServerState {
    pub status: RwLock<BuildStatus>,
    pub cache: RwLock<BundleCache>,
    pub clients: ClientRegistry,
    next_client_id: RwLock<usize>,
    out_dir: PathBuf,
    public_path: String,
}

impl DevServerState {
    pub fn new(out_dir: PathBuf, public_path: impl Into<String>) -> Self {
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            cache: RwLock::new(BundleCache::new()),
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_client_id: RwLock::new(0),
            out_dir,
            public_path: public_path.into(),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
    }

    /// Record a good build and swap in its files.
    pub fn complete_build(&self, duration_ms: u64, cache: BundleCache) {
        *self.cache.write() = cache;
        *self.status.write() = BuildStatus::Success { duration_ms };
    }

    /// Record a failed build. The cache keeps the last good build.
    pub fn fail_build(&self, error: String) {
        *self.status.write() = BuildStatus::Failed { error };
    }

    pub fn get_status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn get_cached_file(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.cache.read().get(path).cloned()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Register a new SSE client.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = {
            let mut next_id = self.next_client_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Send an event to every connected client, dropping the ones that
    /// went away.
    pub fn broadcast(&self, event: &DevEvent) {
        let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        let clients = self.clients.read().clone();

        let mut gone = Vec::new();
        for (id, tx) in clients {
            if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(json.clone()) {
                gone.push(id);
            }
        }
        for id in gone {
            self.unregister_client(id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

pub type SharedState = Arc<DevServerState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_status() {
        let status = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
        assert!(status.is_in_progress());
        assert!(status.error().is_none());

        let status = BuildStatus::Failed {
            error: "Test error".to_string(),
        };
        assert!(!status.is_success());
        assert_eq!(status.error(), Some("Test error"));
    }

    #[test]
    fn test_cache_from_files() {
        let files = vec![
            OutputFile::new("main.1a2b3c4d.css", b"a{}".to_vec()),
            OutputFile::new("index.html", b"<html></html>".to_vec()),
            OutputFile::new("img/logo.12345678.webp", vec![0u8; 4]),
        ];
        let cache = BundleCache::from_files(&files, "/static/");

        assert_eq!(cache.len(), 3);
        let (_, css_type) = cache.get("/static/main.1a2b3c4d.css").unwrap();
        assert_eq!(css_type, "text/css");
        let (_, webp_type) = cache.get("/static/img/logo.12345678.webp").unwrap();
        assert_eq!(webp_type, "image/webp");
        assert!(cache.get("/main.1a2b3c4d.css").is_none());
    }

    #[test]
    fn test_directory_url_serves_index() {
        let files = vec![OutputFile::new("index.html", b"<html></html>".to_vec())];
        let cache = BundleCache::from_files(&files, "/");

        let (content, content_type) = cache.get("/").unwrap();
        assert_eq!(content, b"<html></html>");
        assert!(content_type.starts_with("text/html"));
    }

    #[test]
    fn test_absolute_public_path_served_from_root() {
        let files = vec![OutputFile::new("app.js", b"1".to_vec())];
        let cache = BundleCache::from_files(&files, "https://cdn.example.com/");
        assert!(cache.get("/app.js").is_some());
    }

    #[test]
    fn test_failed_build_keeps_cache() {
        let state = DevServerState::new(PathBuf::from("dist"), "/");
        let mut cache = BundleCache::new();
        cache.insert("/a.js".to_string(), b"1".to_vec(), "text/javascript".to_string());

        state.start_build();
        state.complete_build(10, cache);
        assert!(state.get_status().is_success());

        state.fail_build("broken".to_string());
        assert_eq!(state.get_status().error(), Some("broken"));
        assert!(state.get_cached_file("/a.js").is_some());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_clients() {
        let state = DevServerState::new(PathBuf::from("dist"), "/");
        let (id1, mut rx1) = state.register_client();
        let (id2, rx2) = state.register_client();
        assert_ne!(id1, id2);

        drop(rx2);
        state.broadcast(&DevEvent::BuildStarted);

        assert_eq!(rx1.recv().await.unwrap(), r#"{"type":"BuildStarted"}"#);
        assert_eq!(state.client_count(), 1);
    }
}
