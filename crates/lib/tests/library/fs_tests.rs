//! Build-state handle behavior over the in-memory solver.

use std::sync::Arc;
use std::time::Duration;

use strata_lib::context::Context;
use strata_lib::fs::{FS, FsError};
use strata_lib::llb::State;
use strata_lib::solver::memory::{MemorySolver, MemoryTree};

use super::common::memory_solver;

fn project() -> MemoryTree {
  MemoryTree::new()
    .with_file("/README", "readme")
    .with_dir("/src")
    .with_file("/src/main.rs", "fn main() {}")
    .with_dir("/src/empty")
    .with_symlink("/latest", "src")
}

#[tokio::test]
async fn walk_reports_every_entry_with_full_paths() {
  let input = State::local("project");
  let solver = memory_solver(&input, project());
  let mut fs = FS::new(solver.clone(), input);

  let mut seen = Vec::new();
  fs.walk(&Context::new(), |path, stat| {
    seen.push((path.to_string(), stat.is_dir(), stat.is_symlink()));
    Ok::<_, FsError>(())
  })
  .await
  .unwrap();

  assert_eq!(
    seen,
    vec![
      ("/README".to_string(), false, false),
      ("/src".to_string(), true, false),
      ("/src/main.rs".to_string(), false, false),
      ("/src/empty".to_string(), true, false),
      ("/latest".to_string(), false, true),
    ]
  );
  assert_eq!(solver.solve_count(), 1);
}

#[tokio::test]
async fn branches_of_a_solved_handle_are_independent() {
  let input = State::local("project");
  let mut solver = MemorySolver::new();
  solver.insert(&input, project()).unwrap();
  let extended = input.mkfile("/NOTES", "n", 0o644);
  solver
    .insert(&extended, project().with_file("/NOTES", "n"))
    .unwrap();
  let solver = Arc::new(solver);
  let ctx = Context::new();

  let base = FS::new(solver.clone(), input).solve_and_return(&ctx).await.unwrap();
  let mut branch = base.clone().change([|s: State| s.mkfile("/NOTES", "n", 0o644)]);

  assert_eq!(branch.read_file(&ctx, "/NOTES").await.unwrap(), b"n");
  let mut base = base;
  assert!(matches!(base.read_file(&ctx, "/NOTES").await, Err(FsError::NotFound(_))));
  assert_eq!(solver.solve_count(), 2);
}

#[tokio::test]
async fn deadline_surfaces_as_its_own_error() {
  let input = State::local("project");
  let solver = memory_solver(&input, project());
  let mut fs = FS::new(solver, input);

  let ctx = Context::new().with_timeout(Duration::ZERO);
  tokio::time::sleep(Duration::from_millis(1)).await;
  assert!(matches!(fs.solve(&ctx).await, Err(FsError::DeadlineExceeded)));
  assert!(!fs.is_solved());

  fs.solve(&Context::new()).await.unwrap();
  assert!(fs.is_solved());
}

#[tokio::test]
async fn reference_is_shared_by_clones() {
  let input = State::local("project");
  let solver = memory_solver(&input, project());
  let ctx = Context::new();

  let mut fs = FS::new(solver.clone(), input);
  let reference = fs.reference(&ctx).await.unwrap();
  let mut copy = fs.clone();
  assert_eq!(copy.reference(&ctx).await.unwrap().id(), reference.id());
  assert_eq!(copy.read_dir(&ctx, "/src").await.unwrap().len(), 2);
  assert_eq!(solver.solve_count(), 1);
}
