//! Implementation of the `strata cat` command.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use strata_lib::op::SchemaRegistry;

use super::{LocalArg, build_fs, load_config, load_pipeline, resolve_locals};

/// Build `file` and write `target` from the result to stdout, unmodified.
pub fn cmd_cat(file: &Path, target: &str, path: Option<&str>, locals: &[LocalArg], store: Option<PathBuf>) -> Result<()> {
  let registry = SchemaRegistry::builtin();
  let pipeline = load_pipeline(file, path, &registry)?;
  let config = load_config(store);
  let mut fs = build_fs(&config, resolve_locals(file, &pipeline, locals), &pipeline)?;
  let ctx = config.context();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let content = rt
    .block_on(fs.read_file(&ctx, target))
    .with_context(|| format!("Failed to read {}", target))?;

  let mut stdout = std::io::stdout().lock();
  stdout.write_all(&content).context("Failed to write output")?;
  stdout.flush()?;
  Ok(())
}
