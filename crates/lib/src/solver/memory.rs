//! In-memory solver.
//!
//! Serves prebuilt [`MemoryTree`]s for states registered ahead of time. Useful
//! for embedding callers that compute content elsewhere, and for tests: every
//! call to [`Solver::solve`] is counted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{ReadError, ReadRequest, Reference, SolveError, Solver, apply_range};
use crate::context::Context;
use crate::fs::Stat;
use crate::llb::State;
use crate::util::hash::{HashError, ObjectHash};
use crate::util::path::{base_name, clean_path, components};

const MAX_SYMLINK_HOPS: usize = 16;

#[derive(Debug, Clone)]
enum Node {
  Dir(Dir),
  File { content: Vec<u8>, mode: u32 },
  Symlink(String),
}

#[derive(Debug, Clone)]
struct Dir {
  mode: u32,
  /// Kept in insertion order; listings report entries in this order.
  entries: Vec<(String, Node)>,
}

impl Default for Dir {
  fn default() -> Self {
    Self {
      mode: 0o755,
      entries: Vec::new(),
    }
  }
}

impl Dir {
  fn get(&self, name: &str) -> Option<&Node> {
    self.entries.iter().find(|(n, _)| n == name).map(|(_, node)| node)
  }

  fn put(&mut self, name: &str, node: Node) {
    match self.entries.iter_mut().find(|(n, _)| n == name) {
      Some((_, existing)) => *existing = node,
      None => self.entries.push((name.to_string(), node)),
    }
  }

  fn ensure_dir(&mut self, name: &str) -> &mut Dir {
    let idx = match self.entries.iter().position(|(n, _)| n == name) {
      Some(idx) => {
        if !matches!(self.entries[idx].1, Node::Dir(_)) {
          self.entries[idx].1 = Node::Dir(Dir::default());
        }
        idx
      }
      None => {
        self.entries.push((name.to_string(), Node::Dir(Dir::default())));
        self.entries.len() - 1
      }
    };
    match &mut self.entries[idx].1 {
      Node::Dir(dir) => dir,
      _ => unreachable!("entry was just made a directory"),
    }
  }
}

/// A filesystem tree held in memory.
///
/// Builder methods create missing parent directories on the way.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
  root: Dir,
}

impl MemoryTree {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_dir(mut self, path: &str) -> Self {
    let mut dir = &mut self.root;
    for name in components(path) {
      dir = dir.ensure_dir(&name);
    }
    self
  }

  pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
    self.with_file_mode(path, content, 0o644)
  }

  pub fn with_file_mode(self, path: &str, content: impl Into<Vec<u8>>, mode: u32) -> Self {
    let node = Node::File {
      content: content.into(),
      mode,
    };
    self.with_node(path, node)
  }

  pub fn with_symlink(self, path: &str, target: impl Into<String>) -> Self {
    self.with_node(path, Node::Symlink(target.into()))
  }

  fn with_node(mut self, path: &str, node: Node) -> Self {
    let mut parts = components(path);
    let Some(name) = parts.pop() else {
      return self;
    };
    let mut dir = &mut self.root;
    for part in parts {
      dir = dir.ensure_dir(&part);
    }
    dir.put(&name, node);
    self
  }

  /// Resolve `path`, following symlinks in every component.
  fn lookup(&self, path: &str) -> Option<Entry<'_>> {
    self.resolve(path, true)
  }

  /// Resolve `path` without following a final symlink.
  fn lookup_exact(&self, path: &str) -> Option<Entry<'_>> {
    self.resolve(path, false)
  }

  /// Walk `path` one component at a time. A symlink met on the way restarts
  /// the walk at its target with the remaining components appended; at most
  /// [`MAX_SYMLINK_HOPS`] links are followed per lookup.
  fn resolve(&self, path: &str, follow_last: bool) -> Option<Entry<'_>> {
    let mut pending: VecDeque<String> = components(path).into();
    let mut walked: Vec<String> = Vec::new();
    let mut dir = &self.root;
    let mut hops = 0;

    while let Some(name) = pending.pop_front() {
      let node = dir.get(&name)?;
      let last = pending.is_empty();
      match node {
        Node::Symlink(target) if follow_last || !last => {
          hops += 1;
          if hops > MAX_SYMLINK_HOPS {
            return None;
          }
          let base = if target.starts_with('/') {
            String::new()
          } else {
            walked.join("/")
          };
          let mut next: VecDeque<String> = components(&format!("/{}/{}", base, target)).into();
          next.extend(pending);
          pending = next;
          walked.clear();
          dir = &self.root;
        }
        _ if last => return Some(Entry::Node(node)),
        Node::Dir(next) => {
          walked.push(name);
          dir = next;
        }
        _ => return None,
      }
    }
    Some(Entry::Root)
  }
}

/// Result of a path lookup.
#[derive(Debug, Clone, Copy)]
enum Entry<'a> {
  Root,
  Node(&'a Node),
}

fn stat_of(name: &str, node: &Node) -> Stat {
  match node {
    Node::Dir(dir) => Stat::dir(name, dir.mode),
    Node::File { content, mode } => Stat::file(name, *mode, content.len() as u64),
    Node::Symlink(target) => Stat::symlink(name, target.clone()),
  }
}

/// Reference to a [`MemoryTree`].
#[derive(Debug, Clone)]
pub struct MemoryRef {
  id: String,
  tree: Arc<MemoryTree>,
}

impl MemoryRef {
  pub fn new(id: impl Into<String>, tree: Arc<MemoryTree>) -> Self {
    Self { id: id.into(), tree }
  }

  fn dir_at(&self, path: &str) -> Result<&Dir, ReadError> {
    match self.tree.lookup(path) {
      Some(Entry::Root) => Ok(&self.tree.root),
      Some(Entry::Node(Node::Dir(dir))) => Ok(dir),
      Some(_) => Err(ReadError::NotADirectory(clean_path(path))),
      None => Err(ReadError::NotFound(clean_path(path))),
    }
  }
}

#[async_trait]
impl Reference for MemoryRef {
  fn id(&self) -> &str {
    &self.id
  }

  async fn read_file(&self, ctx: &Context, req: ReadRequest) -> Result<Vec<u8>, ReadError> {
    ctx.check()?;
    match self.tree.lookup(&req.filename) {
      Some(Entry::Node(Node::File { content, .. })) => Ok(apply_range(content, req.range)),
      Some(_) => Err(ReadError::IsADirectory(clean_path(&req.filename))),
      None => Err(ReadError::NotFound(clean_path(&req.filename))),
    }
  }

  async fn read_dir(&self, ctx: &Context, dir: &str) -> Result<Vec<Stat>, ReadError> {
    ctx.check()?;
    let dir = self.dir_at(dir)?;
    Ok(dir.entries.iter().map(|(name, node)| stat_of(name, node)).collect())
  }

  async fn stat_file(&self, ctx: &Context, path: &str) -> Result<Stat, ReadError> {
    ctx.check()?;
    let name = base_name(path).unwrap_or_else(|| "/".to_string());
    match self.tree.lookup_exact(path) {
      Some(Entry::Root) => Ok(Stat::dir(name, self.tree.root.mode)),
      Some(Entry::Node(node)) => Ok(stat_of(&name, node)),
      None => Err(ReadError::NotFound(clean_path(path))),
    }
  }
}

/// Solver answering from registered trees.
///
/// [`State::scratch`] always resolves to an empty tree; any other unregistered
/// input fails with [`SolveError::Unresolved`].
#[derive(Debug, Default)]
pub struct MemorySolver {
  trees: HashMap<ObjectHash, Arc<MemoryTree>>,
  calls: AtomicUsize,
}

impl MemorySolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register the content `state` solves to.
  pub fn insert(&mut self, state: &State, tree: MemoryTree) -> Result<ObjectHash, HashError> {
    let digest = state.digest()?;
    self.trees.insert(digest.clone(), Arc::new(tree));
    Ok(digest)
  }

  /// Number of times [`Solver::solve`] was invoked, successful or not.
  pub fn solve_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Solver for MemorySolver {
  async fn solve(&self, ctx: &Context, input: &State) -> Result<Arc<dyn Reference>, SolveError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    ctx.check()?;

    let digest = input.digest()?;
    let tree = match self.trees.get(&digest) {
      Some(tree) => tree.clone(),
      None if input.is_scratch() => Arc::new(MemoryTree::new()),
      None => return Err(SolveError::Unresolved(digest)),
    };
    debug!(digest = %digest, "resolved in-memory state");
    Ok(Arc::new(MemoryRef::new(digest.0, tree)))
  }
}
