//! Build-state handles.
//!
//! An [`FS`] pairs an input description ([`State`]) with the output a
//! [`Solver`] computed from it. Solving is deferred until content is actually
//! read and the result is memoized on the handle, so repeated reads of an
//! unchanged state reach the solver once.
//!
//! Handles are values. [`set`](FS::set) and [`change`](FS::change) return new
//! handles with an empty output and never touch the handle they were derived
//! from, so a solved handle can be branched from freely without losing its
//! cached output.
//!
//! Lazy operations take `&mut self`: a handle has a single writer, enforced by
//! the borrow checker. Solve once and clone the solved handle to share it.

mod stat;
mod types;

pub use stat::Stat;
pub use types::*;

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::Context;
use crate::llb::State;
use crate::solver::{ReadRequest, Reference, Solver};
use crate::util::path;

#[derive(Clone)]
pub struct FS {
  /// Before the last solve.
  input: State,
  /// After the last solve; only ever computed from the current `input`.
  output: Option<Arc<dyn Reference>>,
  solver: Arc<dyn Solver>,
}

impl std::fmt::Debug for FS {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FS")
      .field("input", &self.input.digest().map(|d| d.0).unwrap_or_default())
      .field("output", &self.output.as_ref().map(|r| r.id().to_string()))
      .finish()
  }
}

impl FS {
  pub fn new(solver: Arc<dyn Solver>, input: State) -> Self {
    Self {
      input,
      output: None,
      solver,
    }
  }

  /// An unsolved handle on the empty filesystem.
  pub fn scratch(solver: Arc<dyn Solver>) -> Self {
    Self::new(solver, State::scratch())
  }

  pub fn solver(&self) -> &Arc<dyn Solver> {
    &self.solver
  }

  /// The raw input description.
  pub fn input(&self) -> &State {
    &self.input
  }

  /// The solved output, if this handle has been solved.
  pub fn output(&self) -> Option<&Arc<dyn Reference>> {
    self.output.as_ref()
  }

  pub fn is_solved(&self) -> bool {
    self.output.is_some()
  }

  /// Compute the output from the input, if not done already.
  ///
  /// On failure the handle stays unsolved and a later call retries.
  pub async fn solve(&mut self, ctx: &Context) -> Result<(), FsError> {
    self.ensure_solved(ctx).await.map(|_| ())
  }

  async fn ensure_solved(&mut self, ctx: &Context) -> Result<Arc<dyn Reference>, FsError> {
    if let Some(output) = &self.output {
      return Ok(output.clone());
    }

    debug!("solving build state");
    let output = ctx.run(self.solver.solve(ctx, &self.input)).await??;
    debug!(output = %output.id(), "solved build state");

    self.output = Some(output.clone());
    Ok(output)
  }

  #[instrument(skip(self, ctx))]
  pub async fn read_file(&mut self, ctx: &Context, filename: &str) -> Result<Vec<u8>, FsError> {
    let output = self.ensure_solved(ctx).await?;
    let content = ctx.run(output.read_file(ctx, ReadRequest::new(filename))).await??;
    Ok(content)
  }

  #[instrument(skip(self, ctx))]
  pub async fn read_dir(&mut self, ctx: &Context, dir: &str) -> Result<Vec<Stat>, FsError> {
    let output = self.ensure_solved(ctx).await?;
    list(ctx, output.as_ref(), dir).await
  }

  /// Pre-order, depth-first traversal of the solved output starting at `/`.
  ///
  /// `visit` receives each entry's full path and its [`Stat`] before the walk
  /// descends into it. Siblings are visited in listing order. The first error
  /// returned by `visit` or by a listing ends the walk.
  pub async fn walk<F, E>(&mut self, ctx: &Context, mut visit: F) -> Result<(), E>
  where
    F: FnMut(&str, &Stat) -> Result<(), E>,
    E: From<FsError>,
  {
    let output = self.ensure_solved(ctx).await?;
    let output = output.as_ref();

    let root = list(ctx, output, "/").await?;
    let mut stack = vec![("/".to_string(), root.into_iter())];

    while let Some((dir, entries)) = stack.last_mut() {
      let Some(stat) = entries.next() else {
        stack.pop();
        continue;
      };

      let full_path = path::join(dir, &stat.path);
      visit(&full_path, &stat)?;

      if stat.is_dir() {
        let children = list(ctx, output, &full_path).await?;
        stack.push((full_path, children.into_iter()));
      }
    }

    Ok(())
  }

  /// Derive a handle by applying each transform to the input in turn.
  ///
  /// Every step yields a fresh, unsolved handle; `self` is consumed, any handle
  /// it was cloned from keeps its own output.
  pub fn change<I, F>(self, changes: I) -> FS
  where
    I: IntoIterator<Item = F>,
    F: FnOnce(State) -> State,
  {
    let mut fs = self;
    for change in changes {
      let next = change(fs.input.clone());
      fs = fs.set(next);
    }
    fs
  }

  /// A handle on `input` with no output, sharing this handle's solver.
  pub fn set(&self, input: State) -> FS {
    FS {
      input,
      output: None,
      solver: self.solver.clone(),
    }
  }

  /// Solve if needed and return a handle guaranteed to carry an output.
  pub async fn solve_and_return(mut self, ctx: &Context) -> Result<FS, FsError> {
    self.ensure_solved(ctx).await?;
    Ok(self)
  }

  /// Solve if needed and return the output reference.
  pub async fn reference(&mut self, ctx: &Context) -> Result<Arc<dyn Reference>, FsError> {
    self.ensure_solved(ctx).await
  }

  /// Package the output for handing upstream.
  pub async fn result(&mut self, ctx: &Context) -> Result<BuildResult, FsError> {
    let mut result = BuildResult::new();
    result.set_ref(self.ensure_solved(ctx).await?);
    Ok(result)
  }
}

async fn list(ctx: &Context, output: &dyn Reference, dir: &str) -> Result<Vec<Stat>, FsError> {
  let entries = ctx.run(output.read_dir(ctx, dir)).await??;
  Ok(entries)
}
