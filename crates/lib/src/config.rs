//! Runtime configuration.
//!
//! Values come from the environment with platform defaults underneath;
//! callers such as the CLI override individual fields afterwards.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::consts::{STORE_ENV, TIMEOUT_ENV};
use crate::context::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Root of the content-addressed object store used by the local solver.
  pub store_dir: PathBuf,

  /// Deadline applied to each top-level solve, if any.
  pub timeout: Option<Duration>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      store_dir: Self::default_store_dir(),
      timeout: None,
    }
  }
}

impl Config {
  /// Resolve configuration from `STRATA_STORE` and `STRATA_TIMEOUT_SECS`.
  pub fn from_env() -> Self {
    let store_dir = std::env::var_os(STORE_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(Self::default_store_dir);

    let timeout = match std::env::var(TIMEOUT_ENV) {
      Ok(raw) => match raw.trim().parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
          warn!(value = %raw, "ignoring invalid {}", TIMEOUT_ENV);
          None
        }
      },
      Err(_) => None,
    };

    Self { store_dir, timeout }
  }

  pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join("strata")
      .join("store")
  }

  pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.store_dir = dir.into();
    self
  }

  /// A fresh context carrying the configured timeout.
  pub fn context(&self) -> Context {
    match self.timeout {
      Some(timeout) => Context::new().with_timeout(timeout),
      None => Context::new(),
    }
  }
}
