//! Layered configuration loading.
//!
//! Priority (highest last): built-in defaults, config file, `SATCHEL_*`
//! environment variables, command-line overrides. The build mode falls back
//! to `NODE_ENV` when no layer sets it.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde::Serialize;

use crate::config::SatchelConfig;
use crate::defaults::{CONFIG_FILE_NAMES, ENV_PREFIX, base_layer};
use crate::error::{ConfigError, Result};
use crate::mode::BuildMode;
use crate::resolved::ResolvedConfig;

/// Values coming from the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,

    #[serde(skip_serializing_if = "OutputOverrides::is_empty")]
    pub output: OutputOverrides,

    #[serde(skip_serializing_if = "DevOverrides::is_empty")]
    pub dev: DevOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl OutputOverrides {
    fn is_empty(&self) -> bool {
        self.dir.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DevOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl DevOverrides {
    fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none()
    }
}

/// Builder for a [`SatchelConfig`] rooted at a project directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    file: Option<PathBuf>,
    overrides: ConfigOverrides,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
            overrides: ConfigOverrides::default(),
            use_env: true,
        }
    }

    /// Use an explicit config file instead of discovering one in the root.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Skip the environment layer entirely (including `NODE_ENV`).
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the config file, if any.
    pub fn discover(&self) -> Result<Option<PathBuf>> {
        if let Some(file) = &self.file {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                self.root.join(file)
            };
            if !path.is_file() {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Some(path));
        }

        Ok(CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file()))
    }

    /// Merge every layer into a raw configuration.
    pub fn load(&self) -> Result<SatchelConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(base_layer()));

        if let Some(path) = self.discover()? {
            tracing::debug!("loading config from {}", path.display());
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(&path)),
                Some("json") => figment.merge(Json::file(&path)),
                other => {
                    return Err(ConfigError::UnsupportedFormat(
                        other.unwrap_or("<none>").to_string(),
                    ));
                }
            };
        }

        if self.use_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        figment = figment.merge(Serialized::defaults(&self.overrides));

        let mut config: SatchelConfig = figment.extract()?;

        if config.mode.is_none() && self.use_env {
            config.mode = std::env::var("NODE_ENV")
                .ok()
                .map(|value| BuildMode::from_node_env(&value));
        }

        Ok(config)
    }

    /// Load, validate and resolve in one go.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let config = self.load()?;
        let resolved = config.resolve(&self.root)?;
        tracing::debug!(
            mode = %resolved.mode,
            rules = resolved.rules.len(),
            entries = resolved.entries.len(),
            "configuration resolved"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_serialize_sparsely() {
        let overrides = ConfigOverrides {
            dev: DevOverrides {
                port: Some(8080),
                host: None,
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&overrides).unwrap();
        assert_eq!(value, serde_json::json!({ "dev": { "port": 8080 } }));
    }

    #[test]
    fn test_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path()).file("nope.toml");
        assert!(matches!(loader.discover(), Err(ConfigError::NotFound(_))));
    }
}
