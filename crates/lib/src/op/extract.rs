use super::{Child, FieldKind, Op, OpError, SchemaRegistry};
use crate::compile::Value;
use crate::consts::OP_TAG_FIELD;

impl Op {
  /// Read an operation tree out of a compiled value.
  ///
  /// The value must be a map whose `op` field names a registered kind. Every
  /// declared parameter is type checked and every child field is extracted
  /// recursively. Undeclared fields are kept as parameters so that
  /// [`validate`](Op::validate) can report them.
  pub fn from_value(value: &Value, registry: &SchemaRegistry) -> Result<Op, OpError> {
    extract(value, registry, "$")
  }

  /// Read a script: a list of operations, or a single operation.
  pub fn script_from_value(value: &Value, registry: &SchemaRegistry) -> Result<Vec<Op>, OpError> {
    Ok(script(value, registry, "$")?.into_iter().map(|(_, op)| op).collect())
  }
}

fn malformed(path: &str, reason: impl Into<String>) -> OpError {
  OpError::Malformed {
    path: path.to_string(),
    reason: reason.into(),
  }
}

fn extract(value: &Value, registry: &SchemaRegistry, path: &str) -> Result<Op, OpError> {
  let map = value
    .as_map()
    .ok_or_else(|| malformed(path, format!("expected an operation, found {}", value.kind_name())))?;

  let kind = match map.get(OP_TAG_FIELD) {
    Some(Value::String(kind)) => kind,
    Some(other) => {
      return Err(malformed(
        path,
        format!("field `{}` must be a string, found {}", OP_TAG_FIELD, other.kind_name()),
      ));
    }
    None => return Err(malformed(path, format!("missing field `{}`", OP_TAG_FIELD))),
  };
  let schema = registry
    .for_tag(kind)
    .ok_or_else(|| malformed(path, format!("unknown operation `{}`", kind)))?;

  let mut op = Op::new(kind.as_str());
  for field in &schema.fields {
    let Some(value) = map.get(&field.name).filter(|v| !v.is_null()) else {
      if field.required {
        return Err(malformed(path, format!("missing required field `{}`", field.name)));
      }
      continue;
    };

    let field_path = format!("{}.{}", path, field.name);
    match field.kind {
      FieldKind::Op => {
        let child = extract(value, registry, &field_path)?;
        op.children.push(Child {
          field: field.name.clone(),
          index: None,
          op: child,
        });
      }
      FieldKind::Script => {
        for (index, child) in script(value, registry, &field_path)? {
          op.children.push(Child {
            field: field.name.clone(),
            index,
            op: child,
          });
        }
      }
      kind => {
        if !kind.accepts(value) {
          return Err(malformed(
            path,
            format!("field `{}` must be a {}, found {}", field.name, kind.name(), value.kind_name()),
          ));
        }
        op.params.insert(field.name.clone(), value.clone());
      }
    }
  }

  for (name, value) in map {
    if name != OP_TAG_FIELD && schema.get(name).is_none() {
      op.params.insert(name.clone(), value.clone());
    }
  }

  Ok(op)
}

fn script(value: &Value, registry: &SchemaRegistry, path: &str) -> Result<Vec<(Option<usize>, Op)>, OpError> {
  if value.get(OP_TAG_FIELD).is_some() {
    return Ok(vec![(None, extract(value, registry, path)?)]);
  }
  let items = value.as_list().ok_or_else(|| {
    malformed(
      path,
      format!("expected a list of operations, found {}", value.kind_name()),
    )
  })?;
  items
    .iter()
    .enumerate()
    .map(|(idx, item)| Ok((Some(idx), extract(item, registry, &format!("{}[{}]", path, idx))?)))
    .collect()
}
