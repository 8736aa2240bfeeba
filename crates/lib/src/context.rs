//! Request-scoped cancellation and deadlines.
//!
//! Every call that may end up waiting on a solver takes a [`Context`]. The
//! context never spawns work of its own: [`Context::run`] simply races the
//! caller's future against cancellation and the deadline.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
  #[error("operation cancelled")]
  Cancelled,

  #[error("deadline exceeded")]
  DeadlineExceeded,
}

/// Cancellation token plus an optional deadline.
///
/// Cloning shares the token: cancelling any clone cancels them all. Use
/// [`child`](Self::child) for a context that can be cancelled independently of
/// its parent while still observing the parent's cancellation.
#[derive(Debug, Clone, Default)]
pub struct Context {
  cancel: CancellationToken,
  deadline: Option<Instant>,
}

impl Context {
  pub fn new() -> Self {
    Self::default()
  }

  /// Tighten the deadline to `timeout` from now. An earlier existing deadline
  /// wins; a timeout too large to represent leaves the deadline unchanged.
  pub fn with_timeout(self, timeout: Duration) -> Self {
    match Instant::now().checked_add(timeout) {
      Some(at) => self.with_deadline(at),
      None => self,
    }
  }

  pub fn with_deadline(mut self, at: Instant) -> Self {
    self.deadline = Some(match self.deadline {
      Some(existing) if existing < at => existing,
      _ => at,
    });
    self
  }

  pub fn child(&self) -> Self {
    Self {
      cancel: self.cancel.child_token(),
      deadline: self.deadline,
    }
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Fail fast if the context is already done.
  pub fn check(&self) -> Result<(), ContextError> {
    if self.cancel.is_cancelled() {
      return Err(ContextError::Cancelled);
    }
    if self.deadline.is_some_and(|d| Instant::now() >= d) {
      return Err(ContextError::DeadlineExceeded);
    }
    Ok(())
  }

  /// Drive `fut` to completion unless the context is cancelled or its deadline
  /// passes first. The future is dropped in that case.
  pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
  where
    F: Future,
  {
    self.check()?;

    let deadline = async {
      match self.deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
      }
    };

    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(ContextError::Cancelled),
      _ = deadline => Err(ContextError::DeadlineExceeded),
      out = fut => Ok(out),
    }
  }
}
