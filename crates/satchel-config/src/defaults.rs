//! Default values for every configuration key.
//!
//! The default rule table: styles through sass + css, images recompressed
//! with a WebP sibling, fonts and SVGs copied into their own folders, XML/CSV
//! as data modules, scripts transpiled to ES modules.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::config::SatchelConfig;
use crate::rules::{DataFormat, RuleConfig, TransformKind, TransformSpec};

pub const CONFIG_FILE_NAMES: &[&str] = &["satchel.toml", "satchel.json"];
pub const ENV_PREFIX: &str = "SATCHEL_";

pub fn default_context() -> PathBuf {
    PathBuf::from("src")
}

pub fn default_entry() -> IndexMap<String, Vec<String>> {
    let mut entry = IndexMap::new();
    entry.insert("main".to_string(), vec!["./js/index.jsx".to_string()]);
    entry
}

pub fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub fn default_filename() -> String {
    "[name].[hash].[ext]".to_string()
}

pub fn default_module_filename() -> String {
    "[path][name].[hash].[ext]".to_string()
}

pub fn default_asset_filename() -> String {
    "[name].[hash].[ext]".to_string()
}

pub fn default_public_path() -> String {
    "/".to_string()
}

pub fn default_hash_length() -> usize {
    8
}

pub fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string()]
}

pub fn default_aliases() -> IndexMap<String, PathBuf> {
    [
        ("@js", "src/js"),
        ("@fonts", "src/fonts"),
        ("@img", "src/img"),
        ("@svg", "src/svg"),
        ("@scss", "src/scss"),
        ("@", "src"),
    ]
    .into_iter()
    .map(|(prefix, dir)| (prefix.to_string(), PathBuf::from(dir)))
    .collect()
}

pub fn default_transform_timeout_ms() -> u64 {
    30_000
}

pub fn default_html_template() -> PathBuf {
    PathBuf::from("index.html")
}

pub fn default_html_filename() -> String {
    "index.html".to_string()
}

pub fn default_html_title() -> String {
    "satchel".to_string()
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    4200
}

pub fn default_debounce_ms() -> u64 {
    100
}

pub fn default_watch_ignore() -> Vec<String> {
    vec!["node_modules".to_string(), "*.log".to_string()]
}

pub fn default_true() -> bool {
    true
}

/// The built-in rule table.
pub fn default_rules() -> Vec<RuleConfig> {
    let script = || vec![TransformSpec::new(TransformKind::script())];

    vec![
        RuleConfig::new(r"\.css$", vec![TransformKind::Css.into()]),
        RuleConfig::new(
            r"\.s[ac]ss$",
            vec![TransformKind::sass().into(), TransformKind::Css.into()],
        ),
        RuleConfig::new(r"\.svg$", vec![TransformKind::File.into()]).with_output_dir("svg"),
        RuleConfig::new(r"\.ico$", vec![TransformKind::File.into()])
            .with_filename("[path][name].[ext]"),
        RuleConfig::new(
            r"\.(png|jpe?g|gif)$",
            vec![
                TransformKind::image().into(),
                TransformSpec::best_effort(TransformKind::webp()),
            ],
        )
        .with_output_dir("img"),
        RuleConfig::new(r"\.(ttf|woff|woff2|eot)$", vec![TransformKind::File.into()])
            .with_output_dir("fonts"),
        RuleConfig::new(r"\.xml$", vec![TransformKind::data(DataFormat::Xml).into()]),
        RuleConfig::new(r"\.csv$", vec![TransformKind::data(DataFormat::Csv).into()]),
        RuleConfig::new(r"\.json$", vec![TransformKind::data(DataFormat::Json).into()]),
        RuleConfig::new(r"\.(m?js|jsx)$", script()).with_exclude("node_modules"),
        RuleConfig::new(r"\.tsx?$", script()).with_exclude("node_modules"),
    ]
}

/// The layer figment starts from.
///
/// Map-valued keys are left empty so a user-supplied `entry` or
/// `resolve.alias` replaces the default instead of merging into it; serde
/// fills them back in when the key is absent everywhere.
pub fn base_layer() -> SatchelConfig {
    let mut config = SatchelConfig::default();
    config.entry.clear();
    config.resolve.alias.clear();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_layer_leaves_maps_empty() {
        let base = base_layer();
        assert!(base.entry.is_empty());
        assert!(base.resolve.alias.is_empty());
        assert_eq!(base.rules, default_rules());
    }

    #[test]
    fn test_default_aliases_are_ordered_specific_first() {
        let keys: Vec<_> = default_aliases().keys().cloned().collect();
        assert_eq!(keys.last().map(String::as_str), Some("@"));
    }

    #[test]
    fn test_default_rules_keep_fan_out_last() {
        for rule in default_rules() {
            if let Some(pos) = rule.chain.iter().position(|s| s.kind.fans_out()) {
                assert_eq!(pos, rule.chain.len() - 1, "rule {}", rule.test);
            }
        }
    }
}
