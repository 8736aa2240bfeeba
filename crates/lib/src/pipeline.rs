//! Turning operation scripts into build states.
//!
//! A pipeline is a list of operations applied in order. Each one becomes a
//! [`State`] transformation; [`Pipeline::execute`] threads them through
//! [`FS::change`], so running a pipeline never solves anything by itself.
//!
//! | kind         | effect                                                        |
//! |--------------|---------------------------------------------------------------|
//! | `local`      | replace the state with the host directory `dir`               |
//! | `copy`       | run `from` on an empty state, copy its `src` to `dest`        |
//! | `exec`       | run `args` with `env` in `dir`                                |
//! | `mkdir`      | create `path` and its parents (mode defaults to 0755)         |
//! | `write-file` | write `content` to `dest` (mode defaults to 0644)             |
//! | `load`       | replace the state with the result of running `from`           |

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use crate::compile::Value;
use crate::fs::FS;
use crate::llb::{ExecOpts, State};
use crate::op::{Op, OpError, SchemaRegistry};

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("unsupported operation: {kind}")]
  Unsupported { kind: String },

  #[error(transparent)]
  Op(#[from] OpError),

  #[error("{kind}: invalid or missing parameter `{name}`")]
  InvalidParam { kind: String, name: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
  script: Vec<Op>,
}

impl Pipeline {
  pub fn new(script: Vec<Op>) -> Self {
    Self { script }
  }

  /// Extract a pipeline from a compiled value: a list of operations, or one.
  pub fn from_value(value: &Value, registry: &SchemaRegistry) -> Result<Self, PipelineError> {
    Ok(Self::new(value.script(registry)?))
  }

  pub fn ops(&self) -> &[Op] {
    &self.script
  }

  /// Validate every operation against the schema registered for its kind.
  pub fn validate(&self, registry: &SchemaRegistry) -> Result<(), PipelineError> {
    for op in &self.script {
      let schema = registry
        .for_tag(&op.kind)
        .ok_or_else(|| PipelineError::Unsupported { kind: op.kind.clone() })?;
      op.validate(&schema.name, registry)?;
    }
    Ok(())
  }

  /// Every host directory imported by a `local` operation, at any depth.
  pub fn local_dirs(&self) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();
    for op in &self.script {
      let _ = op.walk(|node| {
        if node.kind == "local" {
          if let Some(dir) = node.param_str("dir") {
            dirs.insert(dir.to_string());
          }
        }
        Ok::<_, std::convert::Infallible>(())
      });
    }
    dirs
  }

  /// The state produced by running the script on top of `base`.
  pub fn state(&self, base: State) -> Result<State, PipelineError> {
    let mut state = base;
    for op in &self.script {
      state = Step::from_op(op)?.apply(state);
    }
    Ok(state)
  }

  /// Derive a handle with every operation applied to `fs`'s input.
  ///
  /// All operations are checked before the first change is made, so a failing
  /// pipeline leaves nothing half-applied. The returned handle is unsolved.
  pub fn execute(&self, fs: FS) -> Result<FS, PipelineError> {
    let steps = self.script.iter().map(Step::from_op).collect::<Result<Vec<_>, _>>()?;
    debug!(steps = steps.len(), "executing pipeline");
    Ok(fs.change(steps.into_iter().map(|step| move |state: State| step.apply(state))))
  }
}

/// One operation, decoded into the state transformation it stands for.
#[derive(Debug, Clone)]
enum Step {
  Local(String),
  Copy { from: State, src: String, dest: String },
  Exec(ExecOpts),
  Mkdir { path: String, mode: u32 },
  WriteFile { dest: String, content: String, mode: u32 },
  Load(State),
}

impl Step {
  fn from_op(op: &Op) -> Result<Step, PipelineError> {
    let step = match op.kind.as_str() {
      "local" => Step::Local(required_str(op, "dir")?),
      "copy" => Step::Copy {
        from: child_script(op, "from")?,
        src: optional_str(op, "src")?.unwrap_or_else(|| "/".to_string()),
        dest: optional_str(op, "dest")?.unwrap_or_else(|| "/".to_string()),
      },
      "exec" => {
        let args = op
          .param("args")
          .and_then(Value::as_list)
          .and_then(|items| items.iter().map(|i| i.as_str().map(str::to_string)).collect::<Option<Vec<_>>>())
          .filter(|args| !args.is_empty())
          .ok_or_else(|| invalid(op, "args"))?;
        let env = match op.param("env") {
          None => BTreeMap::new(),
          Some(value) => string_map(value).ok_or_else(|| invalid(op, "env"))?,
        };
        let mut opts = ExecOpts::new(args).with_env(env);
        if let Some(dir) = optional_str(op, "dir")? {
          opts = opts.with_cwd(&dir);
        }
        Step::Exec(opts)
      }
      "mkdir" => Step::Mkdir {
        path: required_str(op, "path")?,
        mode: mode(op, DEFAULT_DIR_MODE)?,
      },
      "write-file" => Step::WriteFile {
        dest: required_str(op, "dest")?,
        content: required_str(op, "content")?,
        mode: mode(op, DEFAULT_FILE_MODE)?,
      },
      "load" => Step::Load(child_script(op, "from")?),
      other => return Err(PipelineError::Unsupported { kind: other.to_string() }),
    };
    Ok(step)
  }

  fn apply(self, state: State) -> State {
    match self {
      Step::Local(dir) => State::local(dir),
      Step::Copy { from, src, dest } => state.copy(&from, &src, &dest),
      Step::Exec(opts) => state.run(opts),
      Step::Mkdir { path, mode } => state.mkdir(&path, mode, true),
      Step::WriteFile { dest, content, mode } => state.mkfile(&dest, content, mode),
      Step::Load(loaded) => loaded,
    }
  }
}

fn invalid(op: &Op, name: &str) -> PipelineError {
  PipelineError::InvalidParam {
    kind: op.kind.clone(),
    name: name.to_string(),
  }
}

fn optional_str(op: &Op, name: &str) -> Result<Option<String>, PipelineError> {
  match op.param(name) {
    None => Ok(None),
    Some(value) => value
      .as_str()
      .map(|s| Some(s.to_string()))
      .ok_or_else(|| invalid(op, name)),
  }
}

fn required_str(op: &Op, name: &str) -> Result<String, PipelineError> {
  optional_str(op, name)?.ok_or_else(|| invalid(op, name))
}

fn mode(op: &Op, default: u32) -> Result<u32, PipelineError> {
  match op.param("mode") {
    None => Ok(default),
    Some(value) => value
      .as_i64()
      .and_then(|m| u32::try_from(m).ok())
      .ok_or_else(|| invalid(op, "mode")),
  }
}

fn string_map(value: &Value) -> Option<BTreeMap<String, String>> {
  if value.as_list().is_some_and(<[Value]>::is_empty) {
    return Some(BTreeMap::new());
  }
  value
    .as_map()?
    .iter()
    .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
    .collect()
}

/// Run the operations bound to `field` from an empty state.
fn child_script(op: &Op, field: &str) -> Result<State, PipelineError> {
  Pipeline::new(op.children_of(field).cloned().collect()).state(State::scratch())
}
