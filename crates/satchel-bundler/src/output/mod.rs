//! Writing a finished build to disk.

pub mod writer;

pub use writer::{OutputFile, validate_output_path, write_output};
