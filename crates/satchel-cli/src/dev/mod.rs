//! Development server.
//!
//! - Reload via Server-Sent Events
//! - Last good build served from memory, with a disk fallback
//! - File watching with debouncing
//! - Error overlay in the browser while the build is broken

pub mod error_overlay;
pub mod server;
pub mod state;
pub mod watcher;

pub use server::DevServer;
pub use state::{BuildStatus, BundleCache, DevServerState, SharedState};
pub use watcher::{FileChange, FileWatcher};

use serde::{Deserialize, Serialize};

/// Events pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    BuildStarted,

    BuildCompleted { duration_ms: u64 },

    BuildFailed { error: String },

    ClientConnected { id: usize },
}
