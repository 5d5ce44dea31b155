//! Raw configuration as it appears in `satchel.toml` / `satchel.json`.
//!
//! These types mirror the file format one-to-one. Nothing here is
//! interpreted yet: relative paths stay relative and mode-dependent options
//! stay optional until [`SatchelConfig::resolve`](crate::resolved) turns the
//! whole thing into a [`ResolvedConfig`](crate::ResolvedConfig).

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::defaults::*;
use crate::mode::BuildMode;
use crate::rules::{MatchStrategy, RuleConfig};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatchelConfig {
    /// Build mode. When absent the loader falls back to `NODE_ENV`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,

    /// Source root, relative to the project root.
    #[serde(default = "default_context")]
    pub context: PathBuf,

    /// Entry name to the files it is made of, relative to `context`.
    #[serde(default = "default_entry", skip_serializing_if = "IndexMap::is_empty")]
    pub entry: IndexMap<String, Vec<String>>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Rule table. Setting it replaces the built-in table entirely.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub match_strategy: MatchStrategy,

    #[serde(default)]
    pub optimization: OptimizationConfig,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub dev: DevServerConfig,

    /// Extra directories whose files run through the rule table even though
    /// nothing imports them.
    #[serde(default)]
    pub copy: Vec<PathBuf>,

    /// Worker pool size. Defaults to the number of cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,
}

impl Default for SatchelConfig {
    fn default() -> Self {
        Self {
            mode: None,
            context: default_context(),
            entry: default_entry(),
            output: OutputConfig::default(),
            resolve: ResolveConfig::default(),
            rules: default_rules(),
            match_strategy: MatchStrategy::default(),
            optimization: OptimizationConfig::default(),
            html: HtmlConfig::default(),
            dev: DevServerConfig::default(),
            copy: Vec::new(),
            concurrency: None,
            transform_timeout_ms: default_transform_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,

    /// Template for per-entry bundles (facade script, entry stylesheet).
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Template for individual script modules.
    #[serde(default = "default_module_filename")]
    pub module_filename: String,

    /// Template for everything else, unless a rule overrides it.
    #[serde(default = "default_asset_filename")]
    pub asset_filename: String,

    /// URL prefix the output directory is served under.
    #[serde(default = "default_public_path")]
    pub public_path: String,

    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
            filename: default_filename(),
            module_filename: default_module_filename(),
            asset_filename: default_asset_filename(),
            public_path: default_public_path(),
            hash_length: default_hash_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Extensions probed, in order, for extension-less specifiers.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Specifier prefix to directory, relative to the project root.
    #[serde(default = "default_aliases", skip_serializing_if = "IndexMap::is_empty")]
    pub alias: IndexMap<String, PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            alias: default_aliases(),
        }
    }
}

/// Mode-dependent switches. `None` means "follow the build mode".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,

    /// Pull styles shared by several entries into one stylesheet.
    #[serde(default = "default_true")]
    pub split_chunks: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            minify: None,
            content_hash: None,
            source_maps: None,
            split_chunks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Template, relative to `context`. A built-in page is used when the
    /// file does not exist.
    #[serde(default = "default_html_template")]
    pub template: PathBuf,

    #[serde(default = "default_html_filename")]
    pub filename: String,

    /// `<title>` of the built-in page.
    #[serde(default = "default_html_title")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_whitespace: Option<bool>,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: default_html_template(),
            filename: default_html_filename(),
            title: default_html_title(),
            collapse_whitespace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
            watch_ignore: default_watch_ignore(),
        }
    }
}
