use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::op::{Op, OpError, SchemaRegistry};

/// A compiled configuration value.
///
/// Always a finite tree: the compiler rejects self-referential input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::List(_) => "list",
      Value::Map(_) => "map",
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// List items. An empty map counts as an empty list, since an empty Lua
  /// table is ambiguous.
  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      Value::Map(map) if map.is_empty() => Some(&[]),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.as_map()?.get(key)
  }

  /// Follow a dotted path. Numeric segments index into lists; an empty path
  /// is the value itself.
  pub fn lookup(&self, path: &str) -> Option<&Value> {
    let mut current = self;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
      current = match current {
        Value::Map(map) => map.get(segment)?,
        Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
        _ => return None,
      };
    }
    Some(current)
  }

  /// Extract the operation this value describes.
  pub fn op(&self, registry: &SchemaRegistry) -> Result<Op, OpError> {
    Op::from_value(self, registry)
  }

  /// Extract a script: a list of operations, or a single one.
  pub fn script(&self, registry: &SchemaRegistry) -> Result<Vec<Op>, OpError> {
    Op::script_from_value(self, registry)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::List(items.into_iter().map(Into::into).collect())
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Map(map)
  }
}
