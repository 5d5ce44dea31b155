//! # satchel-bundler
//!
//! Rule-driven asset pipeline: sources are matched against a rule table,
//! pushed through transform chains on a bounded worker pool, and assembled
//! into a content-hashed output directory with a manifest.
//!
//! ```no_run
//! use satchel_bundler::Bundler;
//! use satchel_config::ConfigLoader;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new(".").resolve()?;
//! let report = Bundler::new(config)?
//!     .build(CancellationToken::new())
//!     .await?;
//! for (entry, files) in &report.manifest.entries {
//!     println!("{entry}: {}", files.join(", "));
//! }
//! # Ok(()) }
//! ```

use std::path::PathBuf;

pub mod artifact;
pub mod assemble;
pub mod build;
pub mod chain;
pub mod discovery;
pub mod hash;
pub mod manifest;
pub mod matcher;
pub mod output;
pub mod resolve;
pub mod source;
pub mod transforms;

pub use artifact::{Artifact, ArtifactRole};
pub use build::{BuildPhase, BuildReport, Bundler};
pub use chain::{ChainExecutor, ChainOutcome, ChainStage};
pub use manifest::Manifest;
pub use matcher::{CompiledRule, RuleMatcher};
pub use output::OutputFile;
pub use source::{Origin, Source, SourceGraph, SourceId};
pub use transforms::{Payload, Transform, TransformContext};

pub use satchel_config::{BuildMode, ConfigError, ResolvedConfig};

/// Error types for satchel-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration rejected before the build started.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A file required by an entry has no rule.
    #[error("No rule matched {}", .file.display())]
    NoRuleMatched { file: PathBuf },

    /// An entry lists a file that does not exist.
    #[error("Entry '{entry}' lists a missing file: {}", .file.display())]
    EntryNotFound { entry: String, file: PathBuf },

    /// A local specifier could not be resolved to a file.
    #[error("Cannot resolve '{specifier}' from {}", .importer.display())]
    UnresolvedReference { specifier: String, importer: PathBuf },

    /// A transform failed on a file.
    #[error("Transform '{transform}' failed on {}: {cause}", .file.display())]
    Transform {
        transform: String,
        file: PathBuf,
        cause: String,
    },

    /// Post-processing or output assembly failed.
    #[error("Assembly failed during {step}: {message}")]
    Assembly { step: &'static str, message: String },

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// I/O error with the path it happened on.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The build was cancelled before it finished.
    #[error("Build cancelled")]
    Cancelled,
}

/// Result type alias for satchel-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn assembly(step: &'static str, message: impl ToString) -> Self {
        Error::Assembly {
            step,
            message: message.to_string(),
        }
    }

    /// Whether this error belongs to the assembly class (post-processing or
    /// writing output).
    pub fn is_assembly(&self) -> bool {
        matches!(
            self,
            Error::Assembly { .. } | Error::InvalidOutputPath(_) | Error::WriteFailure(_)
        )
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::NoRuleMatched { .. } => "NO_RULE_MATCHED",
            Error::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            Error::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            Error::Transform { .. } => "TRANSFORM_ERROR",
            Error::Assembly { .. } => "ASSEMBLY_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Io { .. } => "IO_ERROR",
            Error::Cancelled => "CANCELLED",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::NoRuleMatched { file } => Some(Box::new(format!(
                "Add a rule whose `test` matches '{}', or stop importing it.",
                file.display()
            ))),
            Error::EntryNotFound { .. } => Some(Box::new(
                "Entry files are relative to `context`; check the path and the context directory.",
            )),
            Error::UnresolvedReference { specifier, .. } => Some(Box::new(format!(
                "Check that '{}' exists. Extension-less specifiers are probed with `resolve.extensions`; aliases come from `resolve.alias`.",
                specifier
            ))),
            Error::Transform { transform, .. } => Some(Box::new(format!(
                "Fix the input or mark the '{}' stage `best_effort = true` to skip it on failure.",
                transform
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Templates must stay inside the output directory.",
                path
            ))),
            Error::WriteFailure(_) => Some(Box::new(
                "Failed to write output. Check disk space and permissions; the previous output was left untouched.",
            )),
            _ => None,
        }
    }
}
