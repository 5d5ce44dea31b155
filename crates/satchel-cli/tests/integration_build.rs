//! End-to-end runs of the `satchel` binary.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("satchel.toml"), config).unwrap();
    dir
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn satchel(root: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("satchel");
    cmd.arg("--no-color")
        .env_remove("SATCHEL_MODE")
        .env_remove("NODE_ENV")
        .env_remove("RUST_LOG")
        .current_dir(root);
    cmd
}

const CSS_PROJECT: &str = r#"
mode = "production"

[entry]
main = ["./main.css"]
"#;

#[test]
fn build_writes_output_and_manifest() {
    let dir = project(CSS_PROJECT);
    write(dir.path(), "src/main.css", "body { color: red; }\n");

    satchel(dir.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Build Summary"));

    let manifest = fs::read_to_string(dir.path().join("dist/manifest.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    let main = manifest["entries"]["main"][0].as_str().unwrap();
    assert!(main.starts_with("main.") && main.ends_with(".css"), "{main}");
    assert!(dir.path().join("dist").join(main).is_file());
}

#[test]
fn build_honours_cwd_and_out_dir_flags() {
    let dir = project(CSS_PROJECT);
    write(dir.path(), "src/main.css", "body { color: red; }\n");
    let elsewhere = TempDir::new().unwrap();

    satchel(elsewhere.path())
        .args(["build", "--cwd"])
        .arg(dir.path())
        .args(["--out-dir", "public", "--mode", "development"])
        .assert()
        .success();

    assert!(dir.path().join("public/manifest.json").is_file());
    assert!(dir.path().join("public/main.css").is_file());
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn missing_rule_fails_without_output() {
    let dir = project("[entry]\nmain = [\"./notes.txt\"]\n");
    write(dir.path(), "src/notes.txt", "hello");

    satchel(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rule matched"));

    assert!(!dir.path().join("dist").exists());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = project("[output]\nhash_length = 2\n");

    satchel(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("hash_length"));
}

#[test]
fn invalid_mode_flag_is_rejected() {
    let dir = project(CSS_PROJECT);

    satchel(dir.path())
        .args(["build", "--mode", "staging"])
        .assert()
        .failure();
}

#[test]
fn help_lists_commands() {
    cargo_bin_cmd!("satchel")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("serve"));
}
