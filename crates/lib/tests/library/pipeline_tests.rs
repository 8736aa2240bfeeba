//! Pipelines compiled from Lua and applied to build-state handles.

use std::sync::Arc;

use strata_lib::context::Context;
use strata_lib::fs::FS;
use strata_lib::llb::State;
use strata_lib::op::SchemaRegistry;
use strata_lib::pipeline::{Pipeline, PipelineError};
use strata_lib::solver::memory::{MemorySolver, MemoryTree};

use super::common::compile;

#[tokio::test]
async fn pipeline_output_is_solved_lazily() {
  let registry = SchemaRegistry::builtin();
  let pipeline = Pipeline::from_value(
    &compile(
      r#"return {
        { op = "local", dir = "site" },
        { op = "write-file", dest = "/VERSION", content = "1.0" },
      }"#,
    ),
    &registry,
  )
  .unwrap();
  pipeline.validate(&registry).unwrap();

  let expected = State::local("site").mkfile("/VERSION", "1.0", 0o644);
  let mut solver = MemorySolver::new();
  solver
    .insert(&expected, MemoryTree::new().with_file("/index.html", "<p>").with_file("/VERSION", "1.0"))
    .unwrap();
  let solver = Arc::new(solver);

  let mut fs = pipeline.execute(FS::scratch(solver.clone())).unwrap();
  assert_eq!(fs.input(), &expected);
  assert_eq!(solver.solve_count(), 0);

  assert_eq!(fs.read_file(&Context::new(), "/VERSION").await.unwrap(), b"1.0");
  assert_eq!(solver.solve_count(), 1);
}

#[test]
fn invalid_parameters_are_rejected_at_execution() {
  let registry = SchemaRegistry::builtin();
  let pipeline = Pipeline::from_value(&compile(r#"return { op = "mkdir", path = "/x", mode = -1 }"#), &registry).unwrap();

  assert!(pipeline.validate(&registry).is_err());
  let err = pipeline
    .execute(FS::scratch(Arc::new(MemorySolver::new())))
    .unwrap_err();
  assert!(matches!(err, PipelineError::InvalidParam { name, .. } if name == "mode"));
}
