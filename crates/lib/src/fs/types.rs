use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::context::ContextError;
use crate::solver::{ReadError, Reference, SolveError};

/// Errors surfaced by build-state handle operations.
#[derive(Debug, Error)]
pub enum FsError {
  /// The solver could not compute the handle's input.
  #[error("solve failed: {0}")]
  SolveFailed(SolveError),

  /// The path does not exist in the solved output, or is not a directory
  /// where one was required.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("operation cancelled")]
  Cancelled,

  #[error("deadline exceeded")]
  DeadlineExceeded,

  /// Any other failure reading solved content.
  #[error("read failed: {0}")]
  Read(ReadError),
}

impl From<ContextError> for FsError {
  fn from(err: ContextError) -> Self {
    match err {
      ContextError::Cancelled => FsError::Cancelled,
      ContextError::DeadlineExceeded => FsError::DeadlineExceeded,
    }
  }
}

impl From<SolveError> for FsError {
  fn from(err: SolveError) -> Self {
    match err {
      // Context termination is never reported as a domain error.
      SolveError::Context(ctx) => ctx.into(),
      other => FsError::SolveFailed(other),
    }
  }
}

impl From<ReadError> for FsError {
  fn from(err: ReadError) -> Self {
    match err {
      ReadError::NotFound(path) | ReadError::NotADirectory(path) => FsError::NotFound(path),
      ReadError::Context(ctx) => ctx.into(),
      other => FsError::Read(other),
    }
  }
}

/// Solved output packaged for whatever executes the final build.
#[derive(Clone, Default)]
pub struct BuildResult {
  reference: Option<Arc<dyn Reference>>,
  metadata: BTreeMap<String, Vec<u8>>,
}

impl BuildResult {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_ref(&mut self, reference: Arc<dyn Reference>) {
    self.reference = Some(reference);
  }

  pub fn reference(&self) -> Option<&Arc<dyn Reference>> {
    self.reference.as_ref()
  }

  pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
    self.metadata.insert(key.into(), value.into());
  }

  pub fn metadata(&self) -> &BTreeMap<String, Vec<u8>> {
    &self.metadata
  }
}

impl std::fmt::Debug for BuildResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildResult")
      .field("reference", &self.reference.as_ref().map(|r| r.id().to_string()))
      .field("metadata", &self.metadata.keys().collect::<Vec<_>>())
      .finish()
  }
}
