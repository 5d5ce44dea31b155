//! Command implementations.
//!
//! - [`build`] - one build, then a summary
//! - [`serve`] - development server with watch and reload
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod build;
pub mod serve;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use serve::execute as serve_execute;
