//! Miette rendering for CLI errors.

use miette::Report;

use crate::error::CliError;

/// Convert a [`CliError`] into a report for `main` to print.
///
/// Bundler errors keep their diagnostic code and help text.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Config(e) => miette::miette!(
            code = "CONFIG_ERROR",
            help = "Check satchel.toml / satchel.json and the SATCHEL_* environment variables",
            "{}",
            e
        ),
        CliError::FileNotFound(path) => miette::miette!(
            code = "FILE_NOT_FOUND",
            "File not found: {}",
            path.display()
        ),
        CliError::InvalidArgument(message) => miette::miette!(
            code = "INVALID_ARGUMENT",
            help = "Run `satchel --help` for the accepted flags",
            "Invalid argument: {}",
            message
        ),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_bundler_error_keeps_code() {
        let report = cli_error_to_miette(CliError::Build(satchel_bundler::Error::Cancelled));
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("CANCELLED"));
    }

    #[test]
    fn test_invalid_argument_has_code() {
        let report = cli_error_to_miette(CliError::InvalidArgument("--cwd x is not a directory".into()));
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("INVALID_ARGUMENT"));
        assert!(report.to_string().contains("--cwd x"));
    }

    #[test]
    fn test_config_error_has_help() {
        let err = satchel_config::ConfigError::NotFound(PathBuf::from("satchel.toml"));
        let report = cli_error_to_miette(CliError::Config(err));
        assert!(report.help().is_some());
        assert!(report.to_string().contains("satchel.toml"));
    }
}
