use super::{FieldKind, Op, OpError, Schema, SchemaRegistry};

impl Op {
  /// Check this tree against the schema named `schema_name`.
  ///
  /// The node's kind must be the schema's tag, it may only carry declared
  /// fields, and every field constraint must hold. Children are then checked
  /// against the schema registered for their own tag, depth first. The first
  /// failure is returned and names the offending node.
  pub fn validate(&self, schema_name: &str, registry: &SchemaRegistry) -> Result<(), OpError> {
    let schema = registry
      .get(schema_name)
      .ok_or_else(|| OpError::UnknownSchema(schema_name.to_string()))?;
    self.validate_at(schema, registry, "$")
  }

  fn validate_at(&self, schema: &Schema, registry: &SchemaRegistry, path: &str) -> Result<(), OpError> {
    let mismatch = |reason: String| OpError::SchemaMismatch {
      schema: schema.name.clone(),
      kind: self.kind.clone(),
      path: path.to_string(),
      reason,
    };

    if self.kind != schema.tag {
      return Err(mismatch(format!("expected a `{}` operation", schema.tag)));
    }

    for name in self.params.keys() {
      match schema.get(name) {
        Some(field) if field.kind.is_child() => {
          return Err(mismatch(format!("field `{}` must hold operations", name)));
        }
        Some(_) => {}
        None => return Err(mismatch(format!("field `{}` is not allowed", name))),
      }
    }
    for child in &self.children {
      if !schema.get(&child.field).is_some_and(|f| f.kind.is_child()) {
        return Err(mismatch(format!("field `{}` cannot hold operations", child.field)));
      }
    }

    for field in &schema.fields {
      if field.kind.is_child() {
        let count = self.children.iter().filter(|c| c.field == field.name).count();
        if count == 0 && field.required {
          return Err(mismatch(format!("missing required field `{}`", field.name)));
        }
        if field.kind == FieldKind::Op && count > 1 {
          return Err(mismatch(format!("field `{}` takes a single operation", field.name)));
        }
        for constraint in &field.constraints {
          constraint
            .check_count(count)
            .map_err(|why| mismatch(format!("field `{}` {}", field.name, why)))?;
        }
        continue;
      }

      let Some(value) = self.params.get(&field.name) else {
        if field.required {
          return Err(mismatch(format!("missing required field `{}`", field.name)));
        }
        continue;
      };
      if !field.kind.accepts(value) {
        return Err(mismatch(format!(
          "field `{}` must be a {}, found {}",
          field.name,
          field.kind.name(),
          value.kind_name()
        )));
      }
      for constraint in &field.constraints {
        constraint
          .check(value)
          .map_err(|why| mismatch(format!("field `{}` {}", field.name, why)))?;
      }
    }

    for child in &self.children {
      let child_path = format!("{}.{}", path, child.segment());
      let child_schema = registry.for_tag(&child.op.kind).ok_or_else(|| OpError::UnknownKind {
        kind: child.op.kind.clone(),
        path: child_path.clone(),
      })?;
      child.op.validate_at(child_schema, registry, &child_path)?;
    }

    Ok(())
  }
}
