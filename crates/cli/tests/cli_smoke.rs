//! CLI smoke tests for strata.
//!
//! These run the real binary against build files in temporary directories
//! and check exit codes and output.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the strata binary with an isolated store.
fn strata_cmd(temp: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("strata");
  cmd.env("STRATA_STORE", temp.path().join("store"));
  cmd.env_remove("STRATA_TIMEOUT_SECS");
  cmd
}

/// Create a temp directory holding `build.lua` and the given files.
fn temp_project(build: &str, files: &[(&str, &str)]) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("build.lua"), build).unwrap();
  for (path, content) in files {
    let full = temp.path().join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
  }
  temp
}

const SITE_BUILD: &str = r#"
return {
  { op = "local", dir = "site" },
  { op = "mkdir", path = "/meta" },
  { op = "write-file", dest = "/meta/VERSION", content = "1.2.3" },
}
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  let temp = TempDir::new().unwrap();
  strata_cmd(&temp)
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let temp = TempDir::new().unwrap();
  strata_cmd(&temp)
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("strata"));
}

#[test]
fn subcommand_help_works() {
  let temp = TempDir::new().unwrap();
  for cmd in &["validate", "plan", "build", "cat"] {
    strata_cmd(&temp)
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Validate & Plan
// =============================================================================

#[test]
fn validate_accepts_a_valid_script() {
  let temp = temp_project(SITE_BUILD, &[]);
  strata_cmd(&temp)
    .arg("validate")
    .arg(temp.path().join("build.lua"))
    .assert()
    .success()
    .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_reports_the_failing_path() {
  let temp = temp_project(
    r#"return { op = "copy", from = { { op = "local", dir = "a", bogus = 1 } } }"#,
    &[],
  );
  strata_cmd(&temp)
    .args(["validate", "--schema", "#Copy"])
    .arg(temp.path().join("build.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("$.from[0]"));
}

#[test]
fn validate_selects_a_nested_value() {
  let temp = temp_project(
    r#"return { targets = { web = { op = "local", dir = "web" } } }"#,
    &[],
  );
  strata_cmd(&temp)
    .args(["validate", "--schema", "#Local", "--path", "targets.web"])
    .arg(temp.path().join("build.lua"))
    .assert()
    .success();
}

#[test]
fn validate_fails_on_lua_errors() {
  let temp = temp_project("return {", &[]);
  strata_cmd(&temp)
    .arg("validate")
    .arg(temp.path().join("build.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to compile"));
}

#[test]
fn plan_json_lists_operations_and_locals() {
  let temp = temp_project(SITE_BUILD, &[]);
  let output = strata_cmd(&temp)
    .args(["plan", "--output", "json"])
    .arg(temp.path().join("build.lua"))
    .output()
    .unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(plan["operations"].as_array().unwrap().len(), 3);
  assert_eq!(plan["locals"], serde_json::json!(["site"]));
  assert_eq!(plan["digest"].as_str().unwrap().len(), 20);
  assert!(!temp.path().join("store").exists());
}

// =============================================================================
// Build & Cat
// =============================================================================

#[cfg(unix)]
#[test]
fn build_lists_the_result() {
  let temp = temp_project(SITE_BUILD, &[("site/index.html", "<p>hi</p>")]);
  strata_cmd(&temp)
    .args(["build", "--list"])
    .arg(temp.path().join("build.lua"))
    .assert()
    .success()
    .stdout(predicate::str::contains("/index.html"))
    .stdout(predicate::str::contains("/meta/VERSION"))
    .stdout(predicate::str::contains("Build complete"));

  assert!(temp.path().join("store").join("obj").is_dir());
}

#[cfg(unix)]
#[test]
fn cat_prints_file_contents() {
  let temp = temp_project(SITE_BUILD, &[("site/index.html", "<p>hi</p>")]);
  strata_cmd(&temp)
    .arg("cat")
    .arg(temp.path().join("build.lua"))
    .arg("/meta/VERSION")
    .assert()
    .success()
    .stdout("1.2.3");

  strata_cmd(&temp)
    .arg("cat")
    .arg(temp.path().join("build.lua"))
    .arg("/index.html")
    .assert()
    .success()
    .stdout("<p>hi</p>");
}

#[cfg(unix)]
#[test]
fn local_override_replaces_the_default_dir() {
  let temp = temp_project(SITE_BUILD, &[("site/index.html", "default"), ("other/index.html", "override")]);
  strata_cmd(&temp)
    .arg("cat")
    .arg(temp.path().join("build.lua"))
    .arg("/index.html")
    .arg("--local")
    .arg(format!("site={}", temp.path().join("other").display()))
    .assert()
    .success()
    .stdout("override");
}

#[cfg(unix)]
#[test]
fn cat_of_missing_file_fails() {
  let temp = temp_project(SITE_BUILD, &[("site/index.html", "x")]);
  strata_cmd(&temp)
    .arg("cat")
    .arg(temp.path().join("build.lua"))
    .arg("/nope")
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}

#[cfg(unix)]
#[test]
fn failing_exec_fails_the_build() {
  let temp = temp_project(r#"return { op = "exec", args = { "/bin/sh", "-c", "exit 7" } }"#, &[]);
  strata_cmd(&temp)
    .arg("build")
    .arg(temp.path().join("build.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Build failed"));
}
