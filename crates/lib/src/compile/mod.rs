//! Lua front end.
//!
//! A configuration is a Lua chunk whose return value describes the build. The
//! chunk runs in a fresh runtime with only the pure standard libraries loaded
//! (no `io`, `os` or `package`) and a read-only-by-convention `strata` table:
//!
//! - `strata.os`, `strata.arch` - host platform
//! - `strata.dir` - directory of the file being compiled, when compiled from a file
//!
//! The returned Lua value is converted into a plain [`Value`] tree.

mod value;

pub use value::Value;

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("lua error: {0}")]
  Lua(String),

  /// A table contains itself.
  #[error("cyclic table at {path}")]
  Cycle { path: String },

  #[error("unsupported {kind} at {path}")]
  Unsupported { path: String, kind: String },

  #[error("cannot read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<LuaError> for CompileError {
  fn from(err: LuaError) -> Self {
    CompileError::Lua(err.to_string())
  }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
  vars: BTreeMap<String, String>,
}

impl Compiler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Expose an extra string as `strata.vars.<name>`.
  pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.vars.insert(name.into(), value.into());
    self
  }

  /// Evaluate `source` and convert its return value. `label` names the chunk
  /// in error messages.
  pub fn compile(&self, label: &str, source: &str) -> Result<Value, CompileError> {
    let lua = self.runtime(None)?;
    let result = lua.load(source).set_name(label).eval::<LuaValue>()?;
    to_value(&result)
  }

  pub fn compile_file(&self, path: &Path) -> Result<Value, CompileError> {
    let io_error = |source| CompileError::Io {
      path: path.to_path_buf(),
      source,
    };
    let canonical = path.canonicalize().map_err(io_error)?;
    let source = std::fs::read_to_string(&canonical).map_err(io_error)?;
    debug!(path = ?canonical, "compiling");

    let lua = self.runtime(canonical.parent())?;
    let result = lua
      .load(&source)
      .set_name(format!("@{}", canonical.display()))
      .eval::<LuaValue>()?;
    to_value(&result)
  }

  fn runtime(&self, dir: Option<&Path>) -> Result<Lua, CompileError> {
    let libs = LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH | LuaStdLib::UTF8 | LuaStdLib::COROUTINE;
    let lua = Lua::new_with(libs, LuaOptions::default())?;

    let strata = lua.create_table()?;
    strata.set("os", std::env::consts::OS)?;
    strata.set("arch", std::env::consts::ARCH)?;
    if let Some(dir) = dir {
      strata.set("dir", dir.to_string_lossy().to_string())?;
    }
    let vars = lua.create_table()?;
    for (name, value) in &self.vars {
      vars.set(name.as_str(), value.as_str())?;
    }
    strata.set("vars", vars)?;
    lua.globals().set("strata", strata)?;

    Ok(lua)
  }
}

/// Convert a Lua value into a [`Value`] tree.
pub fn to_value(value: &LuaValue) -> Result<Value, CompileError> {
  let mut visiting = Vec::new();
  convert(value, "$", &mut visiting)
}

fn convert(value: &LuaValue, path: &str, visiting: &mut Vec<*const c_void>) -> Result<Value, CompileError> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
    LuaValue::Integer(i) => Ok(Value::Int(*i)),
    LuaValue::Number(n) => Ok(Value::Float(*n)),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Table(table) => {
      let ptr = table.to_pointer();
      if visiting.contains(&ptr) {
        return Err(CompileError::Cycle { path: path.to_string() });
      }
      visiting.push(ptr);
      let converted = convert_table(table, path, visiting);
      visiting.pop();
      converted
    }
    other => Err(CompileError::Unsupported {
      path: path.to_string(),
      kind: other.type_name().to_string(),
    }),
  }
}

fn convert_table(table: &LuaTable, path: &str, visiting: &mut Vec<*const c_void>) -> Result<Value, CompileError> {
  let len = table.raw_len();
  let mut pairs = 0usize;
  let mut string_keys = true;
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, _) = pair?;
    pairs += 1;
    if !matches!(key, LuaValue::String(_)) {
      string_keys = false;
    }
  }

  // A sequence with nothing but keys 1..n.
  if len > 0 && pairs == len {
    let mut items = Vec::with_capacity(len);
    for (idx, item) in table.sequence_values::<LuaValue>().enumerate() {
      items.push(convert(&item?, &format!("{}[{}]", path, idx), visiting)?);
    }
    return Ok(Value::List(items));
  }

  if !string_keys {
    return Err(CompileError::Unsupported {
      path: path.to_string(),
      kind: "table with mixed keys".to_string(),
    });
  }

  let mut map = BTreeMap::new();
  for pair in table.pairs::<LuaString, LuaValue>() {
    let (key, item) = pair?;
    let key = key.to_str()?.to_string();
    let child = convert(&item, &format!("{}.{}", path, key), visiting)?;
    map.insert(key, child);
  }
  Ok(Value::Map(map))
}
