//! `satchel serve`.
//!
//! 1. Initial build (a failure shows the overlay instead of exiting)
//! 2. Bind the HTTP server
//! 3. Watch the project root
//! 4. Rebuild on change; a newer change cancels the build in flight
//! 5. Ctrl+C shuts down

use std::path::Path;
use std::sync::Arc;

use satchel_bundler::{BuildReport, Bundler};
use satchel_config::{BuildMode, ConfigLoader, DevOverrides};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::ServeArgs;
use crate::commands::utils;
use crate::dev::{
    BundleCache, DevEvent, DevServer, DevServerState, FileChange, FileWatcher, SharedState,
};
use crate::error::{CliError, Result};
use crate::ui;

/// A rebuild in flight.
struct RunningBuild {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningBuild {
    /// Cancel and wait, so two builds never race on the output directory.
    async fn supersede(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut project = args.project.clone();
    project.mode = Some(project.mode.unwrap_or(BuildMode::Development));

    let loader = utils::config_loader(
        &project,
        DevOverrides {
            host: args.host.clone(),
            port: args.port,
        },
    )?;
    let config = loader.resolve()?;

    ui::info(&format!(
        "Starting development server for {} ({} mode)",
        config.root.display(),
        config.mode
    ));

    let state: SharedState = Arc::new(DevServerState::new(
        config.output.dir.clone(),
        config.output.public_path.clone(),
    ));

    rebuild(loader.clone(), Arc::clone(&state), CancellationToken::new()).await;

    let server = DevServer::bind(&config.dev.host, config.dev.port, Arc::clone(&state)).await?;
    ui::success(&format!("Development server running at {}", server.url()?));

    let out_dir = config
        .output
        .dir
        .strip_prefix(&config.root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| config.output.dir.clone());
    let (watcher, mut changes) = FileWatcher::new(
        config.root.clone(),
        vec![out_dir],
        config.dev.watch_ignore.clone(),
        config.dev.debounce_ms,
    )?;
    ui::info(&format!("Watching {}", watcher.root().display()));

    let mut server_handle = tokio::spawn(server.run());
    let mut running: Option<RunningBuild> = None;

    ui::info("Press Ctrl+C to stop");
    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                let batch = drain(change, &mut changes);
                log_changes(&batch);

                if let Some(build) = running.take() {
                    build.supersede().await;
                }
                let cancel = CancellationToken::new();
                let handle =
                    tokio::spawn(rebuild(loader.clone(), Arc::clone(&state), cancel.clone()));
                running = Some(RunningBuild { cancel, handle });
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down development server...");
                break;
            }

            result = &mut server_handle => {
                match result {
                    Ok(Err(e)) => ui::error(&e.to_string()),
                    Err(e) => ui::error(&format!("Server task failed: {e}")),
                    Ok(Ok(())) => ui::warning("Server stopped unexpectedly"),
                }
                break;
            }
        }
    }

    if let Some(build) = running.take() {
        build.supersede().await;
    }
    server_handle.abort();
    ui::success("Development server stopped");
    Ok(())
}

/// Collect whatever else arrived with the first change.
fn drain(first: FileChange, changes: &mut mpsc::Receiver<FileChange>) -> Vec<FileChange> {
    let mut batch = vec![first];
    while let Ok(change) = changes.try_recv() {
        batch.push(change);
    }
    batch
}

fn log_changes(batch: &[FileChange]) {
    match batch {
        [single] => ui::info(&format!("File changed: {}", single.path().display())),
        many => ui::info(&format!("{} files changed", many.len())),
    }
}

/// One build for the dev server. Config is re-read each time, so edits to
/// `satchel.toml` apply without a restart.
async fn rebuild(loader: ConfigLoader, state: SharedState, cancel: CancellationToken) {
    state.start_build();
    state.broadcast(&DevEvent::BuildStarted);

    match run_build(&loader, cancel).await {
        Ok((report, public_path)) => {
            let duration_ms = report.duration.as_millis() as u64;
            for warning in &report.warnings {
                ui::warning(warning);
            }
            let cache = BundleCache::from_files(&report.files, &public_path);
            state.complete_build(duration_ms, cache);
            ui::success(&format!(
                "Built {} file(s) in {}",
                report.files.len(),
                ui::format_duration(report.duration)
            ));
            state.broadcast(&DevEvent::BuildCompleted { duration_ms });
        }
        Err(CliError::Build(satchel_bundler::Error::Cancelled)) => {
            debug!("build superseded by a newer change");
        }
        Err(e) => {
            let error = e.to_string();
            ui::error(&format!("Build failed: {error}"));
            state.fail_build(error.clone());
            state.broadcast(&DevEvent::BuildFailed { error });
        }
    }
}

async fn run_build(
    loader: &ConfigLoader,
    cancel: CancellationToken,
) -> Result<(BuildReport, String)> {
    let config = loader.resolve()?;
    let public_path = config.output.public_path.clone();
    let report = Bundler::new(config)?.build(cancel).await?;
    Ok((report, public_path))
}
