use regex::Regex;

use crate::config::SatchelConfig;
use crate::error::{ConfigError, Result};
use crate::rules::RuleConfig;

const HASH_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=64;

impl SatchelConfig {
    /// Validate configuration for logical consistency.
    ///
    /// Runs before anything touches the filesystem; a config that passes can
    /// still fail to build (missing entry file), but never because of an
    /// ill-formed option.
    pub fn validate(&self) -> Result<()> {
        if self.entry.is_empty() {
            return Err(ConfigError::missing(
                "entry",
                "Provide at least one entry, e.g. entry.main = [\"./js/index.js\"]",
            ));
        }

        for (name, files) in &self.entry {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "entry",
                    "\"\"",
                    "Entry names cannot be empty",
                ));
            }
            if files.is_empty() {
                return Err(ConfigError::invalid(
                    format!("entry.{name}"),
                    "[]",
                    "List at least one file for every entry",
                ));
            }
        }

        validate_template("output.filename", &self.output.filename)?;
        validate_template("output.module_filename", &self.output.module_filename)?;
        validate_template("output.asset_filename", &self.output.asset_filename)?;

        if !HASH_LENGTH_RANGE.contains(&self.output.hash_length) {
            return Err(ConfigError::invalid(
                "output.hash_length",
                self.output.hash_length,
                format!(
                    "Must be between {} and {}",
                    HASH_LENGTH_RANGE.start(),
                    HASH_LENGTH_RANGE.end()
                ),
            ));
        }

        for ext in &self.resolve.extensions {
            if !ext.starts_with('.') {
                return Err(ConfigError::invalid(
                    "resolve.extensions",
                    ext,
                    "Extensions start with a dot, e.g. \".js\"",
                ));
            }
        }

        for (prefix, _) in &self.resolve.alias {
            if prefix.is_empty() {
                return Err(ConfigError::invalid(
                    "resolve.alias",
                    "\"\"",
                    "Alias prefixes cannot be empty",
                ));
            }
        }

        if self.rules.is_empty() {
            return Err(ConfigError::missing(
                "rules",
                "Declare at least one rule or remove the key to use the defaults",
            ));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            validate_rule(index, rule)?;
        }

        if self.dev.port == 0 {
            return Err(ConfigError::invalid(
                "dev.port",
                0,
                "Pick a port between 1 and 65535",
            ));
        }

        if self.concurrency == Some(0) {
            return Err(ConfigError::invalid(
                "concurrency",
                0,
                "At least one worker is required",
            ));
        }

        if self.transform_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "transform_timeout_ms",
                0,
                "Timeouts must be positive",
            ));
        }

        if self.html.enabled && self.html.filename.trim().is_empty() {
            return Err(ConfigError::missing(
                "html.filename",
                "Name the generated page or set html.enabled = false",
            ));
        }

        Ok(())
    }
}

fn validate_rule(index: usize, rule: &RuleConfig) -> Result<()> {
    compile_pattern(index, &rule.test)?;
    if let Some(exclude) = &rule.exclude {
        compile_pattern(index, exclude)?;
    }

    if rule.chain.is_empty() {
        return Err(ConfigError::invalid(
            format!("rules[{index}].use"),
            "[]",
            "A rule needs at least one transform; use { kind = \"file\" } to copy as-is",
        ));
    }

    let last = rule.chain.len() - 1;
    for (position, spec) in rule.chain.iter().enumerate() {
        if spec.kind.fans_out() && position != last {
            return Err(ConfigError::FanOutNotLast {
                index,
                transform: spec.kind.name().to_string(),
            });
        }
    }

    if let Some(template) = &rule.filename {
        validate_template(&format!("rules[{index}].filename"), template)?;
    }

    Ok(())
}

fn compile_pattern(index: usize, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        index,
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn validate_template(field: &str, template: &str) -> Result<()> {
    if !template.contains("[name]") {
        return Err(ConfigError::invalid(
            field,
            template,
            "Templates must contain [name]",
        ));
    }
    if template.starts_with('/') {
        return Err(ConfigError::invalid(
            field,
            template,
            "Templates are relative to the output directory",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{TransformKind, TransformSpec};

    #[test]
    fn test_defaults_are_valid() {
        SatchelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_template_without_name() {
        let mut config = SatchelConfig::default();
        config.output.filename = "bundle.[hash].[ext]".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "output.filename"));
    }

    #[test]
    fn test_fan_out_must_be_last() {
        let mut config = SatchelConfig::default();
        config.rules = vec![RuleConfig::new(
            r"\.png$",
            vec![
                TransformSpec::new(TransformKind::webp()),
                TransformSpec::new(TransformKind::image()),
            ],
        )];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::FanOutNotLast { index: 0, .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let mut config = SatchelConfig::default();
        config.rules.push(RuleConfig::new("(unclosed", vec![TransformKind::File.into()]));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
