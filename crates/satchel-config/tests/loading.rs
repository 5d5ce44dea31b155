//! Layering behaviour of `ConfigLoader`.

use satchel_config::{
    BuildMode, ConfigError, ConfigLoader, ConfigOverrides, DevOverrides, MatchStrategy,
    OutputOverrides, TransformKind,
};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &["SATCHEL_MODE", "SATCHEL_DEV__PORT", "NODE_ENV"];

fn clear_env() {
    for var in ENV_VARS {
        unsafe { env::remove_var(var) };
    }
}

fn project(config_name: &str, contents: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join(config_name), contents).expect("write config");
    dir
}

#[test]
#[serial]
fn loads_defaults_without_a_file() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");

    let config = ConfigLoader::new(dir.path()).load().expect("load");

    assert_eq!(config.entry["main"], vec!["./js/index.jsx".to_string()]);
    assert_eq!(config.dev.port, 4200);
    assert_eq!(config.resolve.alias.len(), 6);
    assert_eq!(config.mode, None);
}

#[test]
#[serial]
fn toml_entry_replaces_default_entry() {
    clear_env();
    let dir = project(
        "satchel.toml",
        r#"
context = "assets"
match_strategy = "all-match"

[entry]
app = ["./app.ts", "./app.scss"]

[output]
dir = "public/build"
"#,
    );

    let config = ConfigLoader::new(dir.path()).load().expect("load");

    assert_eq!(config.entry.len(), 1);
    assert_eq!(config.entry["app"].len(), 2);
    assert_eq!(config.context, PathBuf::from("assets"));
    assert_eq!(config.output.dir, PathBuf::from("public/build"));
    assert_eq!(config.match_strategy, MatchStrategy::AllMatch);
    // untouched keys keep their defaults
    assert_eq!(config.output.hash_length, 8);
    assert!(!config.rules.is_empty());
}

#[test]
#[serial]
fn json_rules_replace_default_table() {
    clear_env();
    let dir = project(
        "satchel.json",
        r#"{
            "rules": [
                { "test": "\\.txt$", "use": [{ "kind": "file" }], "output_dir": "text" }
            ]
        }"#,
    );

    let config = ConfigLoader::new(dir.path()).load().expect("load");

    assert_eq!(config.rules.len(), 1);
    assert_eq!(config.rules[0].chain[0].kind, TransformKind::File);
    assert_eq!(config.rules[0].output_dir.as_deref(), Some("text"));
}

#[test]
#[serial]
fn env_overrides_file_and_cli_overrides_env() {
    clear_env();
    let dir = project(
        "satchel.toml",
        r#"
mode = "production"

[dev]
port = 3000
"#,
    );

    unsafe {
        env::set_var("SATCHEL_MODE", "development");
        env::set_var("SATCHEL_DEV__PORT", "5000");
    }

    let from_env = ConfigLoader::new(dir.path()).load().expect("load");
    assert_eq!(from_env.mode, Some(BuildMode::Development));
    assert_eq!(from_env.dev.port, 5000);

    let overrides = ConfigOverrides {
        mode: Some(BuildMode::Production),
        output: OutputOverrides {
            dir: Some(PathBuf::from("out")),
        },
        dev: DevOverrides {
            host: None,
            port: Some(6000),
        },
    };
    let from_cli = ConfigLoader::new(dir.path())
        .overrides(overrides)
        .load()
        .expect("load");
    assert_eq!(from_cli.mode, Some(BuildMode::Production));
    assert_eq!(from_cli.dev.port, 6000);
    assert_eq!(from_cli.output.dir, PathBuf::from("out"));

    clear_env();
}

#[test]
#[serial]
fn node_env_is_the_fallback_mode() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    unsafe { env::set_var("NODE_ENV", "development") };

    let config = ConfigLoader::new(dir.path()).resolve().expect("resolve");
    assert_eq!(config.mode, BuildMode::Development);
    assert!(config.source_maps);
    assert!(!config.content_hash);

    let isolated = ConfigLoader::new(dir.path())
        .without_env()
        .resolve()
        .expect("resolve");
    assert_eq!(isolated.mode, BuildMode::Production);

    clear_env();
}

#[test]
#[serial]
fn malformed_file_is_a_parse_error() {
    clear_env();
    let dir = project("satchel.toml", "entry = 42\n");

    let err = ConfigLoader::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
#[serial]
fn unknown_config_extension_is_rejected() {
    clear_env();
    let dir = project("satchel.yaml", "entry: {}\n");

    let err = ConfigLoader::new(dir.path())
        .file("satchel.yaml")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "yaml"));
}

#[test]
#[serial]
fn resolve_rejects_invalid_values_before_building() {
    clear_env();
    let dir = project(
        "satchel.toml",
        r#"
[output]
hash_length = 2
"#,
    );

    let err = ConfigLoader::new(dir.path()).resolve().unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "output.hash_length")
    );
}
