//! Implementation of the `strata plan` command.
//!
//! Prints the operation tree of a build file and the digest of the state it
//! produces. Nothing is solved.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use strata_lib::llb::State;
use strata_lib::op::SchemaRegistry;

use super::load_pipeline;
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

pub fn cmd_plan(file: &Path, path: Option<&str>, output: OutputFormat) -> Result<()> {
  let registry = SchemaRegistry::builtin();
  let pipeline = load_pipeline(file, path, &registry)?;

  let state = pipeline.state(State::scratch()).context("Failed to apply operations")?;
  let digest = state.digest().context("Failed to hash build state")?;
  let locals = pipeline.local_dirs();

  if output.is_json() {
    let operations: Vec<_> = pipeline.ops().iter().map(|op| op.to_value()).collect();
    return print_json(&json!({
      "digest": digest.0,
      "depth": state.depth(),
      "locals": locals,
      "operations": operations,
    }));
  }

  println!();
  for (i, op) in pipeline.ops().iter().enumerate() {
    op.walk_paths(|node_path, node| {
      let indent = node_path.matches('.').count();
      let label = if indent == 0 { format!("[{}]", i) } else { node_path.to_string() };
      println!("{}{} {} {}", "  ".repeat(indent + 1), symbols::ARROW, node.kind, label);
      Ok::<_, anyhow::Error>(())
    })?;
  }
  println!();

  print_info(&format!("{} operation(s)", pipeline.ops().len()));
  print_stat("State", &digest.to_string());
  print_stat("Depth", &state.depth().to_string());
  if !locals.is_empty() {
    let names: Vec<_> = locals.into_iter().collect();
    print_stat("Locals", &names.join(", "));
  }

  Ok(())
}
