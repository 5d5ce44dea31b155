//! Build mode: the single switch between development and production defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Development builds favour readable output and source maps; production
/// builds minify, hash file names and collapse HTML whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    #[default]
    Production,
}

impl BuildMode {
    pub fn is_development(self) -> bool {
        matches!(self, BuildMode::Development)
    }

    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Interpret a `NODE_ENV` value.
    ///
    /// Only the exact string `development` selects development mode; any
    /// other value (including `test`) builds for production.
    pub fn from_node_env(value: &str) -> Self {
        if value.trim() == "development" {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(ConfigError::invalid(
                "mode",
                other,
                "expected 'development' or 'production'",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dev".parse::<BuildMode>().unwrap(), BuildMode::Development);
        assert_eq!(
            "Production".parse::<BuildMode>().unwrap(),
            BuildMode::Production
        );
        assert!("staging".parse::<BuildMode>().is_err());
    }

    #[test]
    fn test_node_env_only_development_is_dev() {
        assert!(BuildMode::from_node_env("development").is_development());
        assert!(BuildMode::from_node_env("test").is_production());
        assert!(BuildMode::from_node_env("").is_production());
    }
}
