//! Implementation of the `strata build` command.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use strata_lib::fs::{FsError, Stat};
use strata_lib::op::SchemaRegistry;

use super::{LocalArg, build_fs, load_config, load_pipeline, resolve_locals};
use crate::output::{OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success};

/// Solve a build file into the object store and report the result.
///
/// With `list`, every entry of the solved filesystem is printed as well.
pub fn cmd_build(
  file: &Path,
  path: Option<&str>,
  locals: &[LocalArg],
  store: Option<PathBuf>,
  list: bool,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();
  let registry = SchemaRegistry::builtin();
  let pipeline = load_pipeline(file, path, &registry)?;
  let config = load_config(store);
  let mut fs = build_fs(&config, resolve_locals(file, &pipeline, locals), &pipeline)?;
  let ctx = config.context();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (id, entries) = rt.block_on(async {
    let reference = fs.reference(&ctx).await.context("Build failed")?;
    let mut entries: Vec<(String, Stat)> = Vec::new();
    if list {
      fs.walk(&ctx, |entry_path, stat| {
        entries.push((entry_path.to_string(), stat.clone()));
        Ok::<_, FsError>(())
      })
      .await
      .context("Failed to list result")?;
    }
    Ok::<_, anyhow::Error>((reference.id().to_string(), entries))
  })?;
  info!(id = %id, "build complete");

  if output.is_json() {
    let entries: Vec<_> = entries
      .iter()
      .map(|(entry_path, stat)| {
        json!({
          "path": entry_path,
          "mode": format!("{:o}", stat.mode),
          "size": stat.size,
        })
      })
      .collect();
    return print_json(&json!({
      "id": id,
      "store": config.store_dir,
      "entries": entries,
    }));
  }

  if list {
    for (entry_path, stat) in &entries {
      let suffix = if stat.is_dir() {
        "/".to_string()
      } else if stat.is_symlink() {
        format!(" -> {}", stat.linkname)
      } else {
        String::new()
      };
      println!("{:04o} {:>10} {}{}", stat.permissions(), format_bytes(stat.size), entry_path, suffix);
    }
  }

  println!();
  print_success("Build complete!");
  print_stat("Result", &id);
  print_stat("Store", &config.store_dir.display().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
