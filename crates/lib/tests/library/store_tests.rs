//! End-to-end builds through the on-disk solver.

use std::sync::Arc;

use strata_lib::context::Context;
use strata_lib::fs::{FS, FsError};
use strata_lib::op::SchemaRegistry;
use strata_lib::pipeline::Pipeline;
use strata_lib::solver::local::LocalSolver;
use tempfile::TempDir;

use super::common::{compile, write_tree};

const BUILD: &str = r#"
return {
  { op = "local", dir = "app" },
  { op = "mkdir", path = "/dist" },
  {
    op = "exec",
    args = { "/bin/sh", "-c", "cat src/*.txt > dist/bundle.txt" },
    env = { PATH = "/usr/bin:/bin" },
  },
  { op = "copy", from = { { op = "local", dir = "assets" } }, src = "/logo.svg", dest = "/dist" },
}
"#;

struct Workspace {
  temp: TempDir,
}

impl Workspace {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    write_tree(
      &temp.path().join("app"),
      &[("src/a.txt", "A"), ("src/b.txt", "B"), ("README", "app")],
    );
    write_tree(&temp.path().join("assets"), &[("logo.svg", "<svg/>")]);
    Self { temp }
  }

  fn solver(&self) -> LocalSolver {
    LocalSolver::new(self.temp.path().join("store"))
      .with_local("app", self.temp.path().join("app"))
      .with_local("assets", self.temp.path().join("assets"))
  }
}

#[tokio::test]
async fn lua_build_is_realized_on_disk() {
  let ws = Workspace::new();
  let registry = SchemaRegistry::builtin();
  let pipeline = Pipeline::from_value(&compile(BUILD), &registry).unwrap();
  pipeline.validate(&registry).unwrap();

  let mut fs = pipeline.execute(FS::scratch(Arc::new(ws.solver()))).unwrap();
  let ctx = Context::new();

  assert_eq!(fs.read_file(&ctx, "/dist/bundle.txt").await.unwrap(), b"AB");
  assert_eq!(fs.read_file(&ctx, "/dist/logo.svg").await.unwrap(), b"<svg/>");

  let mut paths = Vec::new();
  fs.walk(&ctx, |path, _| {
    paths.push(path.to_string());
    Ok::<_, FsError>(())
  })
  .await
  .unwrap();
  assert_eq!(
    paths,
    vec![
      "/README",
      "/dist",
      "/dist/bundle.txt",
      "/dist/logo.svg",
      "/src",
      "/src/a.txt",
      "/src/b.txt",
    ]
  );
}

#[tokio::test]
async fn missing_local_fails_the_solve() {
  let ws = Workspace::new();
  let solver = LocalSolver::new(ws.temp.path().join("store"));
  let pipeline = Pipeline::from_value(&compile(BUILD), &SchemaRegistry::builtin()).unwrap();

  let mut fs = pipeline.execute(FS::scratch(Arc::new(solver))).unwrap();
  let err = fs.read_dir(&Context::new(), "/").await.unwrap_err();
  assert!(matches!(err, FsError::SolveFailed(_)));
}

#[tokio::test]
async fn cancellation_stops_the_build() {
  let ws = Workspace::new();
  let pipeline = Pipeline::from_value(&compile(BUILD), &SchemaRegistry::builtin()).unwrap();
  let mut fs = pipeline.execute(FS::scratch(Arc::new(ws.solver()))).unwrap();

  let ctx = Context::new();
  ctx.cancel();
  assert!(matches!(fs.solve(&ctx).await, Err(FsError::Cancelled)));
  assert!(!ws.temp.path().join("store").join("obj").exists());
}
