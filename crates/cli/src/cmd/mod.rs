mod build;
mod cat;
mod plan;
mod validate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use strata_lib::compile::{Compiler, Value};
use strata_lib::config::Config;
use strata_lib::fs::FS;
use strata_lib::op::SchemaRegistry;
use strata_lib::pipeline::Pipeline;
use strata_lib::solver::local::LocalSolver;

pub use build::cmd_build;
pub use cat::cmd_cat;
pub use plan::cmd_plan;
pub use validate::cmd_validate;

/// A `NAME=DIR` local import override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArg {
  pub name: String,
  pub dir: PathBuf,
}

impl FromStr for LocalArg {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('=') {
      Some((name, dir)) if !name.is_empty() && !dir.is_empty() => Ok(Self {
        name: name.to_string(),
        dir: PathBuf::from(dir),
      }),
      _ => Err(format!("expected NAME=DIR, got '{}'", s)),
    }
  }
}

/// Compile `file` and select the value at `path`, if given.
pub(crate) fn load_value(file: &Path, path: Option<&str>) -> Result<Value> {
  let value = Compiler::new()
    .compile_file(file)
    .with_context(|| format!("Failed to compile {}", file.display()))?;

  match path {
    None => Ok(value),
    Some(path) => value
      .lookup(path)
      .cloned()
      .ok_or_else(|| anyhow!("no value at '{}' in {}", path, file.display())),
  }
}

pub(crate) fn load_pipeline(file: &Path, path: Option<&str>, registry: &SchemaRegistry) -> Result<Pipeline> {
  let value = load_value(file, path)?;
  let pipeline = Pipeline::from_value(&value, registry).context("Failed to read operations")?;
  pipeline.validate(registry).context("Validation failed")?;
  Ok(pipeline)
}

/// Local imports default to directories next to the build file; `overrides`
/// win over the defaults.
pub(crate) fn resolve_locals(file: &Path, pipeline: &Pipeline, overrides: &[LocalArg]) -> BTreeMap<String, PathBuf> {
  let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
  let mut locals: BTreeMap<String, PathBuf> = pipeline
    .local_dirs()
    .into_iter()
    .map(|name| {
      let dir = base.join(&name);
      (name, dir)
    })
    .collect();
  for arg in overrides {
    locals.insert(arg.name.clone(), arg.dir.clone());
  }
  locals
}

/// The unsolved handle for `pipeline`, backed by the local store.
pub(crate) fn build_fs(config: &Config, locals: BTreeMap<String, PathBuf>, pipeline: &Pipeline) -> Result<FS> {
  let mut solver = LocalSolver::from_config(config);
  for (name, dir) in locals {
    debug!(name = %name, dir = ?dir, "local import");
    solver = solver.with_local(name, dir);
  }
  let fs = pipeline
    .execute(FS::scratch(Arc::new(solver)))
    .context("Failed to apply operations")?;
  Ok(fs)
}

pub(crate) fn load_config(store: Option<PathBuf>) -> Config {
  let config = Config::from_env();
  match store {
    Some(dir) => config.with_store_dir(dir),
    None => config,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn local_arg_parses_name_and_dir() {
    let arg: LocalArg = "app=../app".parse().unwrap();
    assert_eq!(arg.name, "app");
    assert_eq!(arg.dir, PathBuf::from("../app"));

    assert!("app=".parse::<LocalArg>().is_err());
    assert!("=dir".parse::<LocalArg>().is_err());
  }

  #[test]
  fn locals_resolve_next_to_the_build_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("build.lua");
    std::fs::write(
      &file,
      r#"return { { op = "local", dir = "app" }, { op = "copy", from = { { op = "local", dir = "assets" } } } }"#,
    )
    .unwrap();

    let registry = SchemaRegistry::builtin();
    let pipeline = load_pipeline(&file, None, &registry).unwrap();
    let overrides = vec!["assets=/srv/assets".parse().unwrap()];
    let locals = resolve_locals(&file, &pipeline, &overrides);

    assert_eq!(locals["app"], temp.path().join("app"));
    assert_eq!(locals["assets"], PathBuf::from("/srv/assets"));
  }

  #[test]
  fn missing_path_is_an_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("build.lua");
    std::fs::write(&file, r#"return { web = { op = "local", dir = "w" } }"#).unwrap();

    assert!(load_value(&file, Some("web")).is_ok());
    let err = load_value(&file, Some("api")).unwrap_err();
    assert!(err.to_string().contains("api"));
  }
}
