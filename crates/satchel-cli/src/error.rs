//! Error handling for the CLI.
//!
//! Library errors convert into [`CliError`] through `#[from]`; the
//! [`ResultExt`] helpers attach a path or a hint on the way up. `main`
//! renders whatever arrives through [`cli_error_to_miette`].
//!
//! ```rust,no_run
//! use satchel_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_template(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

mod miette;

use std::path::PathBuf;

use thiserror::Error;

pub use self::miette::cli_error_to_miette;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration rejected while loading or validating.
    #[error("Configuration error: {0}")]
    Config(#[from] satchel_config::ConfigError),

    /// The build itself failed.
    #[error(transparent)]
    Build(#[from] satchel_bundler::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The development server could not start or stopped unexpectedly.
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Context helpers for any error that converts into [`CliError`].
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint to the message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_from_config_error() {
        let err: CliError = satchel_config::ConfigError::NotFound(PathBuf::from("satchel.toml")).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("satchel.toml"));
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: CliError = satchel_bundler::Error::NoRuleMatched {
            file: PathBuf::from("src/notes.txt"),
        }
        .into();
        assert_eq!(err.to_string(), "No rule matched src/notes.txt");
    }

    #[test]
    fn test_result_ext_with_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let err = result.with_path("/project/satchel.toml").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(ref p) if p.ends_with("satchel.toml")));
    }

    #[test]
    fn test_result_ext_with_path_keeps_other_errors() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path("/project/dist").unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_result_ext_with_hint() {
        let result: std::result::Result<(), CliError> =
            Err(CliError::InvalidArgument("--port".to_string()));
        let msg = result.with_hint("Pick a free port").unwrap_err().to_string();
        assert!(msg.contains("Invalid argument: --port"));
        assert!(msg.contains("Hint: Pick a free port"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), CliError> = Err(CliError::Server("bind".to_string()));
        let msg = result.context("Failed to start").unwrap_err().to_string();
        assert!(msg.starts_with("Failed to start: Server error"));
    }
}
