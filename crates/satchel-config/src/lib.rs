//! Configuration for the satchel asset pipeline.
//!
//! Configuration goes through three stages:
//!
//! 1. [`ConfigLoader`] merges defaults, `satchel.toml`/`satchel.json`,
//!    `SATCHEL_*` environment variables and command-line overrides into a
//!    raw [`SatchelConfig`].
//! 2. [`SatchelConfig::validate`] rejects ill-formed options with a
//!    [`ConfigError`] before any build starts.
//! 3. [`SatchelConfig::resolve`] applies the build mode and produces the
//!    immutable [`ResolvedConfig`] handed to every pipeline component.
//!
//! ```no_run
//! use satchel_config::{BuildMode, ConfigLoader, ConfigOverrides};
//!
//! # fn main() -> satchel_config::Result<()> {
//! let overrides = ConfigOverrides {
//!     mode: Some(BuildMode::Development),
//!     ..Default::default()
//! };
//! let config = ConfigLoader::new(".").overrides(overrides).resolve()?;
//! assert!(config.source_maps);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod defaults;
pub mod error;
pub mod loading;
pub mod mode;
pub mod resolved;
pub mod rules;
mod validation;

pub use config::{
    DevServerConfig, HtmlConfig, OptimizationConfig, OutputConfig, ResolveConfig, SatchelConfig,
};
pub use error::{ConfigError, Result};
pub use loading::{ConfigLoader, ConfigOverrides, DevOverrides, OutputOverrides};
pub use mode::BuildMode;
pub use resolved::{ResolvedConfig, ResolvedHtml, ResolvedOutput, strip_hash};
pub use rules::{DataFormat, MatchStrategy, RuleConfig, TransformKind, TransformSpec};
