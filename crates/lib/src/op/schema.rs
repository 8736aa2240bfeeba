//! Operation schemas.
//!
//! A schema names an operation shape (`#Copy`) and binds it to the tag value
//! nodes of that shape carry (`copy`). Nodes are looked up by tag during
//! extraction and checked against a schema by name during validation.

use std::collections::BTreeMap;

use crate::compile::Value;

/// Type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  String,
  Int,
  Bool,
  StringList,
  /// Map of strings to strings.
  StringMap,
  /// A single child operation.
  Op,
  /// An ordered list of child operations.
  Script,
}

impl FieldKind {
  /// Whether the field holds child operations rather than a parameter.
  pub fn is_child(&self) -> bool {
    matches!(self, FieldKind::Op | FieldKind::Script)
  }

  pub fn name(&self) -> &'static str {
    match self {
      FieldKind::String => "string",
      FieldKind::Int => "int",
      FieldKind::Bool => "bool",
      FieldKind::StringList => "list of strings",
      FieldKind::StringMap => "map of strings",
      FieldKind::Op => "operation",
      FieldKind::Script => "list of operations",
    }
  }

  /// Type check for parameter kinds. Child kinds are checked by extraction.
  pub fn accepts(&self, value: &Value) -> bool {
    match self {
      FieldKind::String => value.as_str().is_some(),
      FieldKind::Int => value.as_i64().is_some(),
      FieldKind::Bool => value.as_bool().is_some(),
      FieldKind::StringList => value
        .as_list()
        .is_some_and(|items| items.iter().all(|i| i.as_str().is_some())),
      FieldKind::StringMap => value
        .as_map()
        .is_some_and(|map| map.values().all(|v| v.as_str().is_some())),
      FieldKind::Op | FieldKind::Script => false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
  /// Strings, lists and maps must not be empty.
  NonEmpty,
  /// String must start with `/`.
  AbsolutePath,
  /// String must be one of the given values.
  OneOf(Vec<String>),
  /// At least this many items, or child operations for child fields.
  MinItems(usize),
  /// Integer within the inclusive range.
  Range(i64, i64),
}

impl Constraint {
  /// Check a parameter value, returning the reason it fails.
  pub fn check(&self, value: &Value) -> Result<(), String> {
    match self {
      Constraint::NonEmpty => {
        let empty = match value {
          Value::String(s) => s.is_empty(),
          Value::List(items) => items.is_empty(),
          Value::Map(map) => map.is_empty(),
          _ => false,
        };
        if empty { Err("must not be empty".to_string()) } else { Ok(()) }
      }
      Constraint::AbsolutePath => match value.as_str() {
        Some(s) if s.starts_with('/') => Ok(()),
        _ => Err("must be an absolute path".to_string()),
      },
      Constraint::OneOf(allowed) => match value.as_str() {
        Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
        _ => Err(format!("must be one of {}", allowed.join(", "))),
      },
      Constraint::MinItems(_) => self.check_count(value.as_list().map_or(0, <[Value]>::len)),
      Constraint::Range(lo, hi) => match value.as_i64() {
        Some(i) if (*lo..=*hi).contains(&i) => Ok(()),
        _ => Err(format!("must be between {} and {}", lo, hi)),
      },
    }
  }

  /// Check the number of child operations bound to a field.
  pub fn check_count(&self, count: usize) -> Result<(), String> {
    match self {
      Constraint::MinItems(min) if count < *min => Err(format!("needs at least {} item(s), found {}", min, count)),
      Constraint::NonEmpty if count == 0 => Err("must not be empty".to_string()),
      _ => Ok(()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
  pub name: String,
  pub kind: FieldKind,
  pub required: bool,
  pub constraints: Vec<Constraint>,
}

impl Field {
  pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
    Self {
      name: name.into(),
      kind,
      required: true,
      constraints: Vec::new(),
    }
  }

  pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
    Self {
      required: false,
      ..Self::required(name, kind)
    }
  }

  pub fn with(mut self, constraint: Constraint) -> Self {
    self.constraints.push(constraint);
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
  /// Definition name, e.g. `#Copy`.
  pub name: String,
  /// Tag value of the nodes this schema describes, e.g. `copy`.
  pub tag: String,
  /// In declaration order; child operations are ordered by it.
  pub fields: Vec<Field>,
}

impl Schema {
  pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      tag: tag.into(),
      fields: Vec::new(),
    }
  }

  pub fn field(mut self, field: Field) -> Self {
    self.fields.push(field);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Field> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// Schemas by name, with a reverse index by tag.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
  schemas: BTreeMap<String, Schema>,
  by_tag: BTreeMap<String, String>,
}

impl SchemaRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// The built-in operations:
  ///
  /// | schema       | tag          | fields                                              |
  /// |--------------|--------------|-----------------------------------------------------|
  /// | `#Local`     | `local`      | `dir`                                               |
  /// | `#Copy`      | `copy`       | `from` (script), `src`, `dest`                      |
  /// | `#Exec`      | `exec`       | `args`, `env`, `dir`                                |
  /// | `#Mkdir`     | `mkdir`      | `path`, `mode`                                      |
  /// | `#WriteFile` | `write-file` | `dest`, `content`, `mode`                           |
  /// | `#Load`      | `load`       | `from` (script)                                     |
  pub fn builtin() -> Self {
    use FieldKind::*;

    let mode = || Field::optional("mode", Int).with(Constraint::Range(0, 0o7777));
    let mut registry = Self::new();
    registry.register(Schema::new("#Local", "local").field(Field::required("dir", String).with(Constraint::NonEmpty)));
    registry.register(
      Schema::new("#Copy", "copy")
        .field(Field::required("from", Script).with(Constraint::MinItems(1)))
        .field(Field::optional("src", String))
        .field(Field::optional("dest", String)),
    );
    registry.register(
      Schema::new("#Exec", "exec")
        .field(Field::required("args", StringList).with(Constraint::MinItems(1)))
        .field(Field::optional("env", StringMap))
        .field(Field::optional("dir", String).with(Constraint::AbsolutePath)),
    );
    registry.register(
      Schema::new("#Mkdir", "mkdir")
        .field(Field::required("path", String).with(Constraint::NonEmpty))
        .field(mode()),
    );
    registry.register(
      Schema::new("#WriteFile", "write-file")
        .field(Field::required("dest", String).with(Constraint::NonEmpty))
        .field(Field::required("content", String))
        .field(mode()),
    );
    registry.register(Schema::new("#Load", "load").field(Field::required("from", Script).with(Constraint::MinItems(1))));
    registry
  }

  /// Add or replace a schema. The latest registration owns its tag.
  pub fn register(&mut self, schema: Schema) {
    if let Some(previous) = self.schemas.get(&schema.name) {
      if previous.tag != schema.tag && self.by_tag.get(&previous.tag) == Some(&schema.name) {
        self.by_tag.remove(&previous.tag);
      }
    }
    self.by_tag.insert(schema.tag.clone(), schema.name.clone());
    self.schemas.insert(schema.name.clone(), schema);
  }

  pub fn get(&self, name: &str) -> Option<&Schema> {
    self.schemas.get(name)
  }

  /// The schema describing nodes tagged `tag`.
  pub fn for_tag(&self, tag: &str) -> Option<&Schema> {
    self.by_tag.get(tag).and_then(|name| self.schemas.get(name))
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.schemas.keys().map(String::as_str)
  }
}
