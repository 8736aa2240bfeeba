//! Shared helpers for library integration tests.

use std::path::Path;
use std::sync::Arc;

use strata_lib::compile::{Compiler, Value};
use strata_lib::llb::State;
use strata_lib::solver::memory::{MemorySolver, MemoryTree};

/// Compile a Lua snippet, panicking on failure.
pub fn compile(src: &str) -> Value {
  Compiler::new()
    .compile("test", src)
    .unwrap_or_else(|e| panic!("failed to compile test source: {}", e))
}

/// A solver knowing a single state.
pub fn memory_solver(state: &State, tree: MemoryTree) -> Arc<MemorySolver> {
  let mut solver = MemorySolver::new();
  solver.insert(state, tree).unwrap();
  Arc::new(solver)
}

/// Write `files` (relative path, content) below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
  for (rel, content) in files {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }
}
