use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::util::hash::{HashError, Hashable, ObjectHash};
use crate::util::path::clean_path;

/// Options for an [`Vertex::Exec`] step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecOpts {
  /// Program followed by its arguments.
  pub args: Vec<String>,
  /// Variables added on top of the isolated base environment.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  /// Working directory inside the state.
  pub cwd: String,
}

impl ExecOpts {
  pub fn new<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      args: args.into_iter().map(Into::into).collect(),
      env: BTreeMap::new(),
      cwd: "/".to_string(),
    }
  }

  pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = env;
    self
  }

  pub fn with_cwd(mut self, cwd: &str) -> Self {
    self.cwd = clean_path(cwd);
    self
  }
}

/// One node of the graph.
///
/// Every variant except [`Scratch`](Vertex::Scratch) and
/// [`Local`](Vertex::Local) transforms a `base` state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Vertex {
  /// The empty filesystem.
  Scratch,
  /// A host directory, supplied to the solver under `name`.
  Local { name: String },
  /// Copy `src` from `from` into `dest` of `base`.
  Copy {
    base: State,
    from: State,
    src: String,
    dest: String,
  },
  /// Run a command with `base` as its working tree.
  Exec { base: State, opts: ExecOpts },
  Mkdir {
    base: State,
    path: String,
    mode: u32,
    parents: bool,
  },
  Mkfile {
    base: State,
    path: String,
    content: String,
    mode: u32,
  },
}

impl Hashable for Vertex {}

/// Immutable handle on a graph of [`Vertex`] values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Arc<Vertex>);

impl Default for State {
  fn default() -> Self {
    Self::scratch()
  }
}

impl From<Vertex> for State {
  fn from(vertex: Vertex) -> Self {
    State(Arc::new(vertex))
  }
}

impl State {
  pub fn scratch() -> Self {
    Vertex::Scratch.into()
  }

  pub fn local(name: impl Into<String>) -> Self {
    Vertex::Local { name: name.into() }.into()
  }

  pub fn vertex(&self) -> &Vertex {
    &self.0
  }

  pub fn is_scratch(&self) -> bool {
    matches!(*self.0, Vertex::Scratch)
  }

  pub fn copy(&self, from: &State, src: &str, dest: &str) -> State {
    Vertex::Copy {
      base: self.clone(),
      from: from.clone(),
      src: clean_path(src),
      dest: clean_path(dest),
    }
    .into()
  }

  pub fn run(&self, opts: ExecOpts) -> State {
    Vertex::Exec {
      base: self.clone(),
      opts,
    }
    .into()
  }

  pub fn mkdir(&self, path: &str, mode: u32, parents: bool) -> State {
    Vertex::Mkdir {
      base: self.clone(),
      path: clean_path(path),
      mode,
      parents,
    }
    .into()
  }

  pub fn mkfile(&self, path: &str, content: impl Into<String>, mode: u32) -> State {
    Vertex::Mkfile {
      base: self.clone(),
      path: clean_path(path),
      content: content.into(),
      mode,
    }
    .into()
  }

  /// Content address of the whole graph rooted here.
  pub fn digest(&self) -> Result<ObjectHash, HashError> {
    self.0.compute_hash()
  }

  /// Direct dependencies, `base` first.
  pub fn inputs(&self) -> Vec<&State> {
    match &*self.0 {
      Vertex::Scratch | Vertex::Local { .. } => Vec::new(),
      Vertex::Copy { base, from, .. } => vec![base, from],
      Vertex::Exec { base, .. } | Vertex::Mkdir { base, .. } | Vertex::Mkfile { base, .. } => vec![base],
    }
  }

  /// Names of every host directory the graph imports.
  pub fn local_names(&self) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut pending = vec![self];
    while let Some(state) = pending.pop() {
      if let Vertex::Local { name } = &*state.0 {
        names.insert(name.clone());
      }
      pending.extend(state.inputs());
    }
    names
  }

  /// Length of the longest dependency chain ending here.
  pub fn depth(&self) -> usize {
    1 + self.inputs().iter().map(|s| s.depth()).max().unwrap_or(0)
  }
}
