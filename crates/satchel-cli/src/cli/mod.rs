//! Command-line interface definition.
//!
//! - `satchel build` - one production (or development) build
//! - `satchel serve` - development server with watch and reload

mod commands;

use clap::Parser;

pub use commands::{BuildArgs, Command, ProjectArgs, ServeArgs};

/// Satchel - a rule-driven asset pipeline
#[derive(Parser, Debug)]
#[command(
    name = "satchel",
    version,
    about = "A rule-driven asset pipeline",
    long_about = "Satchel runs every file reachable from your entries through a configurable\n\
                  chain of transforms (Sass, CSS, scripts, images, WebP, data files) and\n\
                  writes a content-hashed output directory with a manifest."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_config::BuildMode;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("satchel").chain(args.iter().copied()))
    }

    #[test]
    fn test_build_defaults() {
        let cli = parse(&["build"]).unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert!(args.project.config.is_none());
        assert!(args.project.mode.is_none());
        assert!(args.project.cwd.is_none());
        assert!(args.project.out_dir.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_build_flags() {
        let cli = parse(&[
            "build",
            "--mode",
            "development",
            "--config",
            "conf/satchel.json",
            "--out-dir",
            "public",
            "--cwd",
            "/tmp/site",
            "-v",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.mode, Some(BuildMode::Development));
        assert_eq!(args.project.config, Some(PathBuf::from("conf/satchel.json")));
        assert_eq!(args.project.out_dir, Some(PathBuf::from("public")));
        assert_eq!(args.project.cwd, Some(PathBuf::from("/tmp/site")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_serve_flags() {
        let cli = parse(&["serve", "--host", "0.0.0.0", "--port", "8080"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(8080));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(parse(&["build", "--mode", "staging"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(parse(&["build", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["serve", "--no-color"]).unwrap();
        assert!(cli.no_color);
    }
}
