//! Isolated command execution for `exec` vertices.
//!
//! Commands run against a materialized root filesystem with a scrubbed
//! environment:
//! - all inherited variables are cleared
//! - `PATH` is `/path-not-set` so undeclared tool dependencies fail fast
//! - `HOME` is `/homeless-shelter`
//! - `TMPDIR`, `TMP`, `TEMP` and `TEMPDIR` point at a scratch directory outside the rootfs
//! - `out` points at the rootfs itself
//! - locale is `C` and `SOURCE_DATE_EPOCH` is fixed
//!
//! Variables from [`ExecOpts::env`] are merged on top.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use super::SolveError;
use crate::llb::ExecOpts;
use crate::util::path::components;

/// 1980-01-01T00:00:00Z, the zip epoch.
const SOURCE_DATE_EPOCH: &str = "315532800";

/// Run `opts` with `rootfs` as `/`.
///
/// Returns trimmed stdout. A non-zero exit fails with
/// [`SolveError::ExecFailed`]; the caller discards the rootfs in that case.
pub async fn run_isolated(opts: &ExecOpts, rootfs: &Path, tmp_dir: &Path) -> Result<String, SolveError> {
  let Some((program, args)) = opts.args.split_first() else {
    return Err(SolveError::EmptyExec);
  };
  let cmd = opts.args.join(" ");
  info!(cmd = %cmd, "executing command");

  let working_dir = resolve_in(rootfs, &opts.cwd);
  if !working_dir.is_dir() {
    return Err(SolveError::InvalidPath {
      path: opts.cwd.clone(),
      reason: "working directory does not exist".to_string(),
    });
  }
  tokio::fs::create_dir_all(tmp_dir).await?;

  let mut command = Command::new(program);
  command
    .args(args)
    .current_dir(&working_dir)
    .env_clear()
    .env("PATH", "/path-not-set")
    .env("HOME", "/homeless-shelter")
    .env("TMPDIR", tmp_dir)
    .env("TMP", tmp_dir)
    .env("TEMP", tmp_dir)
    .env("TEMPDIR", tmp_dir)
    .env("out", rootfs)
    .env("LANG", "C")
    .env("LC_ALL", "C")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
    .kill_on_drop(true);

  for (key, value) in &opts.env {
    command.env(key, value);
  }

  debug!(program = %program, working_dir = ?working_dir, "spawning process");
  let output = command.output().await?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    return Err(SolveError::ExecFailed {
      cmd,
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }
  Ok(stdout)
}

/// Map a state path onto the host directory holding the state's root.
pub(crate) fn resolve_in(rootfs: &Path, path: &str) -> PathBuf {
  let mut host = rootfs.to_path_buf();
  host.extend(components(path));
  host
}
