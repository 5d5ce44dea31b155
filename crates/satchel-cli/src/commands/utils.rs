//! Helpers shared by commands.

use std::path::{Path, PathBuf};

use satchel_config::{ConfigLoader, ConfigOverrides, DevOverrides, OutputOverrides};

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result, ResultExt};

/// Resolve a path relative to the current working directory.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to get current working directory: {e}"),
        ))
    })
}

/// Project root: `--cwd` when given, else the current directory.
pub fn project_root(args: &ProjectArgs) -> Result<PathBuf> {
    let cwd = get_cwd()?;
    let Some(dir) = &args.cwd else {
        return Ok(cwd);
    };

    let root = resolve_path(dir, &cwd);
    if !std::fs::metadata(&root).with_path(&root)?.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "--cwd {} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// Build the config loader for a command. Flags become the top layer of the
/// merge; `dev` carries the serve-only host and port.
pub fn config_loader(args: &ProjectArgs, dev: DevOverrides) -> Result<ConfigLoader> {
    let root = project_root(args)?;

    let mut loader = ConfigLoader::new(&root);
    if let Some(file) = &args.config {
        loader = loader.file(resolve_path(file, &root));
    }

    Ok(loader.overrides(ConfigOverrides {
        mode: args.mode,
        output: OutputOverrides {
            dir: args.out_dir.clone(),
        },
        dev,
    }))
}
