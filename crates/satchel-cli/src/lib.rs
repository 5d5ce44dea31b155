//! Satchel CLI.
//!
//! Command-line front end for the satchel asset pipeline:
//!
//! - [`cli`] - argument definitions (clap derive)
//! - [`commands`] - `build` and `serve`
//! - [`dev`] - the reloading development server
//! - [`error`] - `CliError` and its miette rendering
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and the build summary
//!
//! ```rust,no_run
//! use satchel_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
