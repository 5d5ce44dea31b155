//! The immutable configuration every pipeline component receives.
//!
//! Resolution happens exactly once per process (per rebuild in the dev
//! server). Mode-dependent defaults are applied here, paths are made
//! absolute and templates lose their `[hash]` placeholder when content
//! hashing is off, so downstream code never branches on the build mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use path_clean::PathClean;

use crate::config::{DevServerConfig, SatchelConfig};
use crate::error::{ConfigError, Result};
use crate::mode::BuildMode;
use crate::rules::{MatchStrategy, RuleConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub mode: BuildMode,
    /// Absolute project root.
    pub root: PathBuf,
    /// Absolute source root.
    pub context: PathBuf,
    pub entries: IndexMap<String, Vec<String>>,
    pub output: ResolvedOutput,
    pub extensions: Vec<String>,
    /// Alias prefix to absolute directory, longest prefix first.
    pub aliases: Vec<(String, PathBuf)>,
    pub rules: Vec<RuleConfig>,
    pub match_strategy: MatchStrategy,
    pub minify: bool,
    pub content_hash: bool,
    pub source_maps: bool,
    pub split_chunks: bool,
    pub html: Option<ResolvedHtml>,
    pub dev: DevServerConfig,
    /// Absolute directories scanned in addition to the entry graph.
    pub copy: Vec<PathBuf>,
    pub concurrency: usize,
    pub transform_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Absolute output directory.
    pub dir: PathBuf,
    pub filename: String,
    pub module_filename: String,
    pub asset_filename: String,
    /// Always ends with `/`.
    pub public_path: String,
    pub hash_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHtml {
    /// Absolute template path; may not exist.
    pub template: PathBuf,
    pub filename: String,
    pub title: String,
    pub collapse_whitespace: bool,
}

impl SatchelConfig {
    /// Validate and resolve against the project `root`.
    pub fn resolve(self, root: &Path) -> Result<ResolvedConfig> {
        self.validate()?;

        let root = absolutize(root)?;
        let mode = self.mode.unwrap_or_default();
        let context = root.join(&self.context).clean();
        let out_dir = root.join(&self.output.dir).clean();

        if out_dir == root || context.starts_with(&out_dir) {
            return Err(ConfigError::invalid(
                "output.dir",
                self.output.dir.display(),
                "The output directory is wiped on every build; it cannot contain the sources",
            ));
        }

        let minify = self.optimization.minify.unwrap_or(mode.is_production());
        let content_hash = self
            .optimization
            .content_hash
            .unwrap_or(mode.is_production());
        let source_maps = self
            .optimization
            .source_maps
            .unwrap_or(mode.is_development());

        let template = |t: &str| {
            if content_hash {
                t.to_string()
            } else {
                strip_hash(t)
            }
        };

        let output = ResolvedOutput {
            dir: out_dir,
            filename: template(&self.output.filename),
            module_filename: template(&self.output.module_filename),
            asset_filename: template(&self.output.asset_filename),
            public_path: normalize_public_path(&self.output.public_path),
            hash_length: self.output.hash_length,
        };

        let mut aliases: Vec<(String, PathBuf)> = self
            .resolve
            .alias
            .iter()
            .map(|(prefix, dir)| (prefix.clone(), root.join(dir).clean()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let rules = self
            .rules
            .into_iter()
            .map(|mut rule| {
                rule.filename = rule.filename.map(|f| template(&f));
                rule
            })
            .collect();

        let html = self.html.enabled.then(|| ResolvedHtml {
            template: context.join(&self.html.template).clean(),
            filename: self.html.filename.clone(),
            title: self.html.title.clone(),
            collapse_whitespace: self
                .html
                .collapse_whitespace
                .unwrap_or(mode.is_production()),
        });

        let copy = self.copy.iter().map(|dir| root.join(dir).clean()).collect();

        Ok(ResolvedConfig {
            mode,
            context,
            entries: self.entry,
            output,
            extensions: self.resolve.extensions,
            aliases,
            rules,
            match_strategy: self.match_strategy,
            minify,
            content_hash,
            source_maps,
            split_chunks: self.optimization.split_chunks,
            html,
            dev: self.dev,
            copy,
            concurrency: self.concurrency.unwrap_or_else(num_cpus::get).max(1),
            transform_timeout: Duration::from_millis(self.transform_timeout_ms),
            root,
        })
    }
}

impl ResolvedConfig {
    /// Path of `file` relative to the context directory, `/`-separated.
    pub fn relative_to_context(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.context).unwrap_or(file);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Public URL for a path relative to the output directory.
    pub fn public_url(&self, output_path: &str) -> String {
        format!("{}{}", self.output.public_path, output_path)
    }
}

/// Remove the `[hash]` placeholder together with the separator before it.
pub fn strip_hash(template: &str) -> String {
    template
        .replace(".[hash]", "")
        .replace("-[hash]", "")
        .replace("[hash]", "")
}

fn normalize_public_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf().clean());
    }
    Ok(std::env::current_dir()?.join(path).clean())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(config: SatchelConfig) -> ResolvedConfig {
        config.resolve(Path::new("/project")).unwrap()
    }

    #[test]
    fn test_production_defaults() {
        let mut config = SatchelConfig::default();
        config.mode = Some(BuildMode::Production);
        let resolved = resolve(config);

        assert!(resolved.minify);
        assert!(resolved.content_hash);
        assert!(!resolved.source_maps);
        assert_eq!(resolved.output.filename, "[name].[hash].[ext]");
        assert_eq!(resolved.context, PathBuf::from("/project/src"));
        assert_eq!(resolved.output.dir, PathBuf::from("/project/dist"));
        assert!(resolved.html.unwrap().collapse_whitespace);
    }

    #[test]
    fn test_development_strips_hash() {
        let mut config = SatchelConfig::default();
        config.mode = Some(BuildMode::Development);
        let resolved = resolve(config);

        assert!(!resolved.minify);
        assert!(resolved.source_maps);
        assert_eq!(resolved.output.filename, "[name].[ext]");
        assert_eq!(resolved.output.module_filename, "[path][name].[ext]");
    }

    #[test]
    fn test_explicit_override_beats_mode() {
        let mut config = SatchelConfig::default();
        config.mode = Some(BuildMode::Development);
        config.optimization.content_hash = Some(true);
        let resolved = resolve(config);
        assert_eq!(resolved.output.asset_filename, "[name].[hash].[ext]");
    }

    #[test]
    fn test_aliases_sorted_longest_first() {
        let resolved = resolve(SatchelConfig::default());
        assert_eq!(resolved.aliases.last().unwrap().0, "@");
        assert_eq!(
            resolved.aliases[0].1.parent(),
            Some(Path::new("/project/src"))
        );
    }

    #[test]
    fn test_out_dir_cannot_be_root() {
        let mut config = SatchelConfig::default();
        config.output.dir = PathBuf::from(".");
        assert!(config.resolve(Path::new("/project")).is_err());
    }

    #[test]
    fn test_public_path_normalized() {
        let mut config = SatchelConfig::default();
        config.output.public_path = "/static".to_string();
        let resolved = resolve(config);
        assert_eq!(resolved.public_url("a.js"), "/static/a.js");
    }

    #[test]
    fn test_strip_hash() {
        assert_eq!(strip_hash("[name].[hash].[ext]"), "[name].[ext]");
        assert_eq!(strip_hash("[name]-[hash].[ext]"), "[name].[ext]");
        assert_eq!(strip_hash("[name][hash].[ext]"), "[name].[ext]");
    }
}
