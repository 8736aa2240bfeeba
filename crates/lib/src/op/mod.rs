//! Operation trees.
//!
//! Every operation is the same [`Op`] type: a `kind` tag, named parameters and
//! ordered child operations. What a kind may contain is described by a
//! [`Schema`] looked up in a [`SchemaRegistry`], never by a Rust type per kind,
//! so the set of operations stays open.
//!
//! ```
//! use strata_lib::compile::Compiler;
//! use strata_lib::op::SchemaRegistry;
//!
//! let registry = SchemaRegistry::builtin();
//! let value = Compiler::new()
//!   .compile("example", r#"return { op = "copy", from = { { op = "local", dir = "src" } } }"#)
//!   .unwrap();
//! let op = value.op(&registry).unwrap();
//! op.validate("#Copy", &registry).unwrap();
//! assert_eq!(op.count(), 2);
//! ```

mod extract;
pub mod schema;
mod validate;

pub use schema::{Constraint, Field, FieldKind, Schema, SchemaRegistry};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::compile::Value;
use crate::consts::OP_TAG_FIELD;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
  /// The value cannot be read as an operation at all.
  #[error("malformed operation at {path}: {reason}")]
  Malformed { path: String, reason: String },

  /// The node at `path` does not conform to `schema`.
  #[error("{kind} at {path} does not match {schema}: {reason}")]
  SchemaMismatch {
    schema: String,
    kind: String,
    path: String,
    reason: String,
  },

  /// No schema is registered for a child's tag.
  #[error("no schema for operation {kind} at {path}")]
  UnknownKind { kind: String, path: String },

  #[error("unknown schema {0}")]
  UnknownSchema(String),
}

/// A child operation and the field it is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
  pub field: String,
  /// Position within a list-valued field, `None` for single-operation fields.
  pub index: Option<usize>,
  pub op: Op,
}

impl Child {
  /// Path segment naming this child under its parent, e.g. `from[0]`.
  pub fn segment(&self) -> String {
    match self.index {
      Some(idx) => format!("{}[{}]", self.field, idx),
      None => self.field.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Op {
  pub kind: String,
  /// Named parameters, excluding the tag and child fields.
  pub params: BTreeMap<String, Value>,
  /// In schema field order, then list order within a field.
  pub children: Vec<Child>,
}

impl Op {
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      params: BTreeMap::new(),
      children: Vec::new(),
    }
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  /// Bind a single child operation to `field`.
  pub fn with_child(mut self, field: impl Into<String>, op: Op) -> Self {
    self.children.push(Child {
      field: field.into(),
      index: None,
      op,
    });
    self
  }

  /// Bind a list of child operations to `field`.
  pub fn with_script(mut self, field: impl Into<String>, ops: Vec<Op>) -> Self {
    let field = field.into();
    for (idx, op) in ops.into_iter().enumerate() {
      self.children.push(Child {
        field: field.clone(),
        index: Some(idx),
        op,
      });
    }
    self
  }

  pub fn param(&self, name: &str) -> Option<&Value> {
    self.params.get(name)
  }

  pub fn param_str(&self, name: &str) -> Option<&str> {
    self.param(name).and_then(Value::as_str)
  }

  /// Child operations bound to `field`, in order.
  pub fn children_of<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Op> + 'a {
    self.children.iter().filter(move |c| c.field == field).map(|c| &c.op)
  }

  /// Visit this node, then its descendants depth first in child order. The
  /// first error returned by `visit` ends the walk.
  pub fn walk<F, E>(&self, mut visit: F) -> Result<(), E>
  where
    F: FnMut(&Op) -> Result<(), E>,
  {
    self.walk_paths(|_, op| visit(op))
  }

  /// Like [`walk`](Self::walk), also passing each node's path (`$`,
  /// `$.from[0]`, ...).
  pub fn walk_paths<F, E>(&self, mut visit: F) -> Result<(), E>
  where
    F: FnMut(&str, &Op) -> Result<(), E>,
  {
    let mut stack = vec![("$".to_string(), self)];
    while let Some((path, op)) = stack.pop() {
      visit(&path, op)?;
      for child in op.children.iter().rev() {
        stack.push((format!("{}.{}", path, child.segment()), &child.op));
      }
    }
    Ok(())
  }

  /// Number of nodes in the tree.
  pub fn count(&self) -> usize {
    let mut n = 0;
    let _ = self.walk(|_| {
      n += 1;
      Ok::<_, std::convert::Infallible>(())
    });
    n
  }

  /// The value this operation was extracted from, modulo formatting.
  pub fn to_value(&self) -> Value {
    let mut map = self.params.clone();
    map.insert(OP_TAG_FIELD.to_string(), Value::from(self.kind.as_str()));
    for child in &self.children {
      let value = child.op.to_value();
      match child.index {
        None => {
          map.insert(child.field.clone(), value);
        }
        Some(_) => match map.entry(child.field.clone()).or_insert_with(|| Value::List(Vec::new())) {
          Value::List(items) => items.push(value),
          other => *other = Value::List(vec![value]),
        },
      }
    }
    Value::Map(map)
  }
}
