use std::path::PathBuf;

use clap::{Args, Subcommand};
use satchel_config::BuildMode;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project once
    ///
    /// Discovers every file reachable from the configured entries, runs the
    /// matching transform chains and replaces the output directory
    /// atomically. Nothing is written when the build fails.
    Build(BuildArgs),

    /// Start the development server
    ///
    /// Builds in development mode, serves the output with live reload and
    /// rebuilds whenever a source file changes.
    Serve(ServeArgs),
}

/// Options shared by every command that loads a project.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Configuration file (defaults to satchel.toml or satchel.json in the
    /// project root)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Build mode: development or production
    ///
    /// Overrides `mode` from the config file, SATCHEL_MODE and NODE_ENV.
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<BuildMode>,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Output directory, relative to the project root
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Interface to listen on
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,
}
