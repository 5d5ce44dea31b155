//! File system watcher with debouncing for `satchel serve`.
//!
//! Watches the whole project root; changes under the output directory,
//! hidden paths and `dev.watch_ignore` patterns are dropped.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Result, ResultExt};

#[derive(Debug, Clone)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Rules deciding which paths never trigger a rebuild.
#[derive(Debug, Clone)]
struct IgnoreSet {
    root: PathBuf,
    /// Directories relative to the root, such as the output directory.
    dirs: Vec<PathBuf>,
    /// `*.ext` suffixes or directory names.
    patterns: Vec<String>,
}

impl IgnoreSet {
    fn should_ignore(&self, path: &Path) -> bool {
        let Ok(rel_path) = path.strip_prefix(&self.root) else {
            return true;
        };

        if self.dirs.iter().any(|dir| rel_path.starts_with(dir)) {
            return true;
        }

        let path_str = rel_path.to_string_lossy();
        for pattern in &self.patterns {
            if let Some(suffix) = pattern.strip_prefix('*') {
                if path_str.ends_with(suffix) {
                    return true;
                }
            } else if rel_path
                .components()
                .any(|c| c.as_os_str().to_str() == Some(pattern.as_str()))
            {
                return true;
            }
        }

        rel_path.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
        })
    }
}

/// Watches a directory recursively and sends debounced changes through a
/// channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// `ignored_dirs` may be absolute or relative to `root`; absolute ones
    /// outside the root are dropped.
    pub fn new(
        root: PathBuf,
        ignored_dirs: Vec<PathBuf>,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        // notify reports canonical paths
        let root = root.canonicalize().with_path(&root)?;
        let dirs = ignored_dirs
            .into_iter()
            .filter_map(|dir| {
                if dir.is_absolute() {
                    let dir = dir.canonicalize().unwrap_or(dir);
                    dir.strip_prefix(&root).ok().map(Path::to_path_buf)
                } else {
                    Some(dir)
                }
            })
            .collect();
        let ignore = IgnoreSet {
            root: root.clone(),
            dirs,
            patterns: ignore_patterns,
        };

        let (tx, rx) = mpsc::channel(100);
        let debounce = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if ignore.should_ignore(path) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
