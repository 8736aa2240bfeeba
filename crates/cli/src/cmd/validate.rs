//! Implementation of the `strata validate` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use strata_lib::op::SchemaRegistry;

use super::{load_pipeline, load_value};
use crate::output::{OutputFormat, print_json, print_stat, print_success};

/// Validate a build file.
///
/// With `schema`, the selected value must be one operation matching that
/// schema. Otherwise it is read as a script and every operation is checked
/// against the schema registered for its kind.
pub fn cmd_validate(file: &Path, schema: Option<&str>, path: Option<&str>, output: OutputFormat) -> Result<()> {
  let registry = SchemaRegistry::builtin();

  let (operations, nodes) = match schema {
    Some(schema) => {
      let op = load_value(file, path)?
        .op(&registry)
        .context("Failed to read operation")?;
      op.validate(schema, &registry)
        .with_context(|| format!("Validation against {} failed", schema))?;
      (1, op.count())
    }
    None => {
      let pipeline = load_pipeline(file, path, &registry)?;
      let nodes = pipeline.ops().iter().map(|op| op.count()).sum();
      (pipeline.ops().len(), nodes)
    }
  };

  if output.is_json() {
    print_json(&json!({
      "valid": true,
      "operations": operations,
      "nodes": nodes,
    }))?;
  } else {
    print_success(&format!("{} is valid", file.display()));
    print_stat("Operations", &operations.to_string());
    print_stat("Nodes", &nodes.to_string());
  }

  Ok(())
}
