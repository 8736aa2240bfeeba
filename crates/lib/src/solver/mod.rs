//! Solvers turn a [`State`] into readable content.
//!
//! The build-state handle only depends on the two traits defined here:
//! [`Solver`] computes an opaque [`Reference`] from an input description, and
//! a `Reference` answers file and directory queries about the content it
//! addresses. Two implementations ship with the crate:
//!
//! - [`memory::MemorySolver`] - prebuilt in-memory trees keyed by digest
//! - [`local::LocalSolver`] - realizes graphs into an on-disk object store

pub mod exec;
pub mod local;
pub mod memory;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{Context, ContextError};
use crate::fs::Stat;
use crate::llb::State;
use crate::util::hash::{HashError, ObjectHash, TreeHashError};

/// Byte range of a file read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRange {
  pub offset: u64,
  pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
  pub filename: String,
  /// Whole file when `None`.
  pub range: Option<FileRange>,
}

impl ReadRequest {
  pub fn new(filename: impl Into<String>) -> Self {
    Self {
      filename: filename.into(),
      range: None,
    }
  }

  pub fn with_range(mut self, offset: u64, length: u64) -> Self {
    self.range = Some(FileRange { offset, length });
    self
  }
}

/// Slice `content` down to `range`, clamping at the end of the file.
pub(crate) fn apply_range(content: &[u8], range: Option<FileRange>) -> Vec<u8> {
  match range {
    None => content.to_vec(),
    Some(FileRange { offset, length }) => {
      let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
      let end = start.saturating_add(usize::try_from(length).unwrap_or(usize::MAX)).min(content.len());
      content[start..end].to_vec()
    }
  }
}

/// Errors from reading solved content.
#[derive(Debug, Error)]
pub enum ReadError {
  #[error("no such file or directory: {0}")]
  NotFound(String),

  #[error("not a directory: {0}")]
  NotADirectory(String),

  #[error("is a directory: {0}")]
  IsADirectory(String),

  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors from computing a state.
#[derive(Debug, Error)]
pub enum SolveError {
  /// No content is known for this input.
  #[error("no content for input {0}")]
  Unresolved(ObjectHash),

  /// The graph imports a host directory the solver was not given.
  #[error("local directory not provided: {0}")]
  MissingLocal(String),

  #[error("copy source not found: {0}")]
  CopySource(String),

  /// A path inside the state collides with an existing entry of the wrong type.
  #[error("invalid path {path}: {reason}")]
  InvalidPath { path: String, reason: String },

  #[error("command failed with exit code {code:?}: {cmd}")]
  ExecFailed { cmd: String, code: Option<i32> },

  #[error("exec requires at least one argument")]
  EmptyExec,

  #[error(transparent)]
  Context(#[from] ContextError),

  #[error("hash error: {0}")]
  Hash(#[from] HashError),

  #[error("tree hash error: {0}")]
  TreeHash(#[from] TreeHashError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Opaque handle on solved, immutable content.
#[async_trait]
pub trait Reference: Send + Sync {
  /// Content address of the solved input.
  fn id(&self) -> &str;

  async fn read_file(&self, ctx: &Context, req: ReadRequest) -> Result<Vec<u8>, ReadError>;

  /// List the entries of `dir`. Fails with [`ReadError::NotADirectory`] or
  /// [`ReadError::NotFound`] if `dir` is not an existing directory.
  async fn read_dir(&self, ctx: &Context, dir: &str) -> Result<Vec<Stat>, ReadError>;

  /// Stat a single path. The returned [`Stat::path`] is the path's base name.
  async fn stat_file(&self, ctx: &Context, path: &str) -> Result<Stat, ReadError>;
}

#[async_trait]
pub trait Solver: Send + Sync {
  async fn solve(&self, ctx: &Context, input: &State) -> Result<Arc<dyn Reference>, SolveError>;
}
