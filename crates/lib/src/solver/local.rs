//! Solver realizing graphs into an on-disk object store.
//!
//! Each vertex is materialized bottom-up into its own store object:
//!
//! ```text
//! <store>/obj/<key>/
//!   rootfs/              the vertex's filesystem
//!   .strata-complete     marker written once rootfs is final
//! ```
//!
//! `<key>` is the vertex digest, mixed with the content hash of every host
//! directory the vertex imports so edits to a local directory invalidate the
//! objects built from it. Objects are staged in a temporary directory next to
//! their final location and renamed into place, so a present object without a
//! valid marker only ever comes from an interrupted run and is rebuilt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::exec::{resolve_in, run_isolated};
use super::store::StoreRef;
use super::{Reference, SolveError, Solver};
use crate::config::Config;
use crate::consts::{OBJ_HASH_PREFIX_LEN, OBJECT_COMPLETE_MARKER, OBJECT_ROOTFS_DIR};
use crate::context::Context;
use crate::llb::{State, Vertex};
use crate::util::hash::{ContentHash, ObjectHash, hash_tree};
use crate::util::path::{base_name, clean_path};

/// Entries excluded when hashing an object:
/// - the marker itself, written after the hash
/// - `tmp`, scratch space of `exec` steps
const OBJECT_HASH_EXCLUSIONS: &[&str] = &[OBJECT_COMPLETE_MARKER, "tmp"];

/// Content of the completion marker.
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectMarker {
  pub version: u32,
  /// Always "complete".
  pub status: String,
  /// Full SHA-256 of the object, see [`hash_tree`].
  pub output_hash: String,
}

#[derive(Debug, Clone)]
pub struct LocalSolver {
  store: PathBuf,
  locals: BTreeMap<String, PathBuf>,
}

impl LocalSolver {
  pub fn new(store: impl Into<PathBuf>) -> Self {
    Self {
      store: store.into(),
      locals: BTreeMap::new(),
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(&config.store_dir)
  }

  /// Provide the host directory imported by `local` vertices named `name`.
  pub fn with_local(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
    self.locals.insert(name.into(), dir.into());
    self
  }

  pub fn store(&self) -> &Path {
    &self.store
  }

  fn objects_dir(&self) -> PathBuf {
    self.store.join("obj")
  }

  /// Hash every host directory `state` imports.
  async fn hash_locals(&self, state: &State) -> Result<BTreeMap<String, ContentHash>, SolveError> {
    let mut hashes = BTreeMap::new();
    for name in state.local_names() {
      let dir = self
        .locals
        .get(&name)
        .cloned()
        .ok_or_else(|| SolveError::MissingLocal(name.clone()))?;
      if !dir.is_dir() {
        return Err(SolveError::MissingLocal(name));
      }
      let hash = blocking(move || Ok(hash_tree(&dir, &[])?)).await?;
      debug!(local = %name, hash = %hash, "hashed local directory");
      hashes.insert(name, hash);
    }
    Ok(hashes)
  }

  /// Realize `state` and every state it depends on. Returns the object directory.
  fn realize<'a>(
    &'a self,
    ctx: &'a Context,
    state: &'a State,
    locals: &'a BTreeMap<String, ContentHash>,
  ) -> BoxFuture<'a, Result<PathBuf, SolveError>> {
    async move {
      ctx.check()?;

      let key = object_key(state, locals)?;
      let obj_dir = self.objects_dir().join(&key.0);
      if ctx.run(cached(&obj_dir)).await?? {
        debug!(key = %key, "object already in store (cache hit)");
        return Ok(obj_dir);
      }

      fs::create_dir_all(self.objects_dir()).await?;
      let staging = tempfile::Builder::new()
        .prefix(".stage-")
        .tempdir_in(self.objects_dir())?;
      let rootfs = staging.path().join(OBJECT_ROOTFS_DIR);

      match state.vertex() {
        Vertex::Scratch => {
          fs::create_dir_all(&rootfs).await?;
        }
        Vertex::Local { name } => {
          let dir = self
            .locals
            .get(name)
            .ok_or_else(|| SolveError::MissingLocal(name.clone()))?;
          info!(local = %name, dir = ?dir, "importing local directory");
          copy_tree(dir.clone(), rootfs.clone()).await?;
        }
        Vertex::Copy { base, from, src, dest } => {
          let base_dir = self.realize(ctx, base, locals).await?;
          let from_dir = self.realize(ctx, from, locals).await?;
          copy_tree(base_dir.join(OBJECT_ROOTFS_DIR), rootfs.clone()).await?;
          copy_between(&from_dir.join(OBJECT_ROOTFS_DIR), src, &rootfs, dest).await?;
        }
        Vertex::Exec { base, opts } => {
          let base_dir = self.realize(ctx, base, locals).await?;
          copy_tree(base_dir.join(OBJECT_ROOTFS_DIR), rootfs.clone()).await?;
          let tmp_dir = staging.path().join("tmp");
          ctx.run(run_isolated(opts, &rootfs, &tmp_dir)).await??;
          fs::remove_dir_all(&tmp_dir).await?;
        }
        Vertex::Mkdir {
          base,
          path,
          mode,
          parents,
        } => {
          let base_dir = self.realize(ctx, base, locals).await?;
          copy_tree(base_dir.join(OBJECT_ROOTFS_DIR), rootfs.clone()).await?;
          make_dir(&rootfs, path, *mode, *parents).await?;
        }
        Vertex::Mkfile {
          base,
          path,
          content,
          mode,
        } => {
          let base_dir = self.realize(ctx, base, locals).await?;
          copy_tree(base_dir.join(OBJECT_ROOTFS_DIR), rootfs.clone()).await?;
          make_file(&rootfs, path, content, *mode).await?;
        }
      }

      ctx.run(write_marker(staging.path())).await??;

      let staged = staging.keep();
      if let Err(e) = fs::rename(&staged, &obj_dir).await {
        // Another solve may have finished the same object first.
        let raced = cached(&obj_dir).await.unwrap_or(false);
        let _ = fs::remove_dir_all(&staged).await;
        if !raced {
          return Err(e.into());
        }
      }
      info!(key = %key, "realized object");
      Ok(obj_dir)
    }
    .boxed()
  }
}

#[async_trait]
impl Solver for LocalSolver {
  async fn solve(&self, ctx: &Context, input: &State) -> Result<Arc<dyn Reference>, SolveError> {
    ctx.check()?;
    let locals = self.hash_locals(input).await?;
    let key = object_key(input, &locals)?;
    let obj_dir = self.realize(ctx, input, &locals).await?;
    Ok(Arc::new(StoreRef::new(key.0, obj_dir.join(OBJECT_ROOTFS_DIR))))
  }
}

/// Store key of `state`: its digest, mixed with the content of imported locals.
fn object_key(state: &State, locals: &BTreeMap<String, ContentHash>) -> Result<ObjectHash, SolveError> {
  let digest = state.digest()?;
  let names = state.local_names();
  if names.is_empty() {
    return Ok(digest);
  }

  let mut hasher = Sha256::new();
  hasher.update(digest.0.as_bytes());
  for name in names {
    let hash = locals.get(&name).ok_or_else(|| SolveError::MissingLocal(name.clone()))?;
    hasher.update(format!("\n{}={}", name, hash.0).as_bytes());
  }
  let full = format!("{:x}", hasher.finalize());
  Ok(ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string()))
}

fn read_marker(obj_dir: &Path) -> Option<ObjectMarker> {
  let content = std::fs::read_to_string(obj_dir.join(OBJECT_COMPLETE_MARKER)).ok()?;
  serde_json::from_str(&content).ok()
}

/// Run filesystem-heavy work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, SolveError>
where
  F: FnOnce() -> Result<T, SolveError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(work)
    .await
    .map_err(std::io::Error::other)?
}

/// Whether `obj_dir` holds a complete, uncorrupted object. Anything else found
/// at that location is removed.
async fn cached(obj_dir: &Path) -> Result<bool, SolveError> {
  let obj_dir = obj_dir.to_path_buf();
  blocking(move || cached_blocking(&obj_dir)).await
}

fn cached_blocking(obj_dir: &Path) -> Result<bool, SolveError> {
  if !obj_dir.exists() {
    return Ok(false);
  }

  let Some(marker) = read_marker(obj_dir) else {
    debug!(path = ?obj_dir, "incomplete object found, removing");
    std::fs::remove_dir_all(obj_dir)?;
    return Ok(false);
  };

  match hash_tree(obj_dir, OBJECT_HASH_EXCLUSIONS) {
    Ok(current) if current.0 == marker.output_hash => Ok(true),
    Ok(current) => {
      warn!(
        path = ?obj_dir,
        expected = %marker.output_hash,
        actual = %current.0,
        "object corrupted, will rebuild"
      );
      std::fs::remove_dir_all(obj_dir)?;
      Ok(false)
    }
    Err(e) => {
      warn!(path = ?obj_dir, error = %e, "failed to hash object, will rebuild");
      std::fs::remove_dir_all(obj_dir)?;
      Ok(false)
    }
  }
}

async fn write_marker(obj_dir: &Path) -> Result<(), SolveError> {
  let dir = obj_dir.to_path_buf();
  let output_hash = blocking(move || Ok(hash_tree(&dir, OBJECT_HASH_EXCLUSIONS)?)).await?;
  let marker = ObjectMarker {
    version: 1,
    status: "complete".to_string(),
    output_hash: output_hash.0,
  };
  let content = serde_json::to_string(&marker).map_err(std::io::Error::other)?;
  fs::write(obj_dir.join(OBJECT_COMPLETE_MARKER), format!("{}\n", content)).await?;
  Ok(())
}

/// Copy the contents of `from` into `to`, creating `to` if needed. Symlinks
/// are copied as links and permissions are preserved.
async fn copy_tree(from: PathBuf, to: PathBuf) -> Result<(), SolveError> {
  blocking(move || copy_tree_blocking(&from, &to, None)).await
}

/// With `confine_to` set, every target is checked against that root before it
/// is written, since `to` may already hold symlinks.
fn copy_tree_blocking(from: &Path, to: &Path, confine_to: Option<(&Path, &str)>) -> Result<(), SolveError> {
  for entry in WalkDir::new(from).sort_by_file_name() {
    let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
    let rel = entry.path().strip_prefix(from).unwrap_or(Path::new(""));
    let target = to.join(rel);
    let file_type = entry.file_type();
    if let Some((root, path)) = confine_to {
      confine(root, &target, path)?;
    }

    if file_type.is_dir() {
      std::fs::create_dir_all(&target)?;
      let perms = std::fs::metadata(entry.path())?.permissions();
      std::fs::set_permissions(&target, perms)?;
    } else if file_type.is_symlink() {
      let link = std::fs::read_link(entry.path())?;
      if target.symlink_metadata().is_ok() {
        remove_entry(&target)?;
      }
      symlink(&link, &target)?;
    } else {
      if target.is_dir() {
        std::fs::remove_dir_all(&target)?;
      }
      std::fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Copy `src` of one rootfs to `dest` of another.
///
/// A directory source has its contents merged into `dest`. A file source is
/// written to `dest`, or inside it when `dest` is an existing directory.
async fn copy_between(from_root: &Path, src: &str, to_root: &Path, dest: &str) -> Result<(), SolveError> {
  let src_host = resolve_in(from_root, src);
  let metadata = fs::symlink_metadata(&src_host)
    .await
    .map_err(|_| SolveError::CopySource(clean_path(src)))?;
  let dest_host = resolve_in(to_root, dest);
  confine_async(to_root, &dest_host, dest).await?;

  if metadata.is_dir() {
    if dest_host.exists() && !dest_host.is_dir() {
      return Err(SolveError::InvalidPath {
        path: clean_path(dest),
        reason: "destination is not a directory".to_string(),
      });
    }
    let (root, dest) = (to_root.to_path_buf(), dest.to_string());
    return blocking(move || copy_tree_blocking(&src_host, &dest_host, Some((&root, &dest)))).await;
  }

  let target = if dest_host.is_dir() {
    match base_name(src) {
      Some(name) => dest_host.join(name),
      None => dest_host,
    }
  } else {
    dest_host
  };
  confine_async(to_root, &target, dest).await?;
  if let Some(parent) = target.parent() {
    ensure_parent_dirs(to_root, parent, dest).await?;
  }
  debug!(src = %src, dest = ?target, "copying file");
  blocking(move || {
    if metadata.file_type().is_symlink() {
      if target.symlink_metadata().is_ok() {
        remove_entry(&target)?;
      }
      symlink(&std::fs::read_link(&src_host)?, &target)?;
    } else {
      std::fs::copy(&src_host, &target)?;
    }
    Ok(())
  })
  .await
}

/// Fail unless `host` stays inside `root` once symlinks are resolved.
///
/// The deepest existing ancestor of `host` (or `host` itself) is resolved;
/// anything below it does not exist yet and is created as a plain entry. A
/// symlink that cannot be resolved counts as an escape.
fn confine(root: &Path, host: &Path, path: &str) -> Result<(), SolveError> {
  let escape = || SolveError::InvalidPath {
    path: clean_path(path),
    reason: "resolves outside the filesystem root".to_string(),
  };
  let root = root.canonicalize()?;
  let mut current = host;
  loop {
    if current.symlink_metadata().is_ok() {
      let resolved = current.canonicalize().map_err(|_| escape())?;
      return if resolved.starts_with(&root) { Ok(()) } else { Err(escape()) };
    }
    current = current.parent().ok_or_else(escape)?;
  }
}

async fn confine_async(root: &Path, host: &Path, path: &str) -> Result<(), SolveError> {
  let (root, host, path) = (root.to_path_buf(), host.to_path_buf(), path.to_string());
  blocking(move || confine(&root, &host, &path)).await
}

/// Create `dir` and any missing ancestors inside `root`, failing if one of
/// them exists as something other than a directory.
async fn ensure_parent_dirs(root: &Path, dir: &Path, path: &str) -> Result<(), SolveError> {
  let mut current = dir;
  while current.starts_with(root) && current != root {
    if current.exists() && !current.is_dir() {
      return Err(SolveError::InvalidPath {
        path: clean_path(path),
        reason: "parent is not a directory".to_string(),
      });
    }
    match current.parent() {
      Some(parent) => current = parent,
      None => break,
    }
  }
  fs::create_dir_all(dir).await?;
  Ok(())
}

async fn make_dir(rootfs: &Path, path: &str, mode: u32, parents: bool) -> Result<(), SolveError> {
  let host = resolve_in(rootfs, path);
  confine_async(rootfs, &host, path).await?;
  if host.exists() {
    if !host.is_dir() {
      return Err(SolveError::InvalidPath {
        path: clean_path(path),
        reason: "file exists".to_string(),
      });
    }
  } else if parents {
    ensure_parent_dirs(rootfs, &host, path).await?;
  } else {
    let parent_ok = host.parent().is_some_and(Path::is_dir);
    if !parent_ok {
      return Err(SolveError::InvalidPath {
        path: clean_path(path),
        reason: "parent directory does not exist".to_string(),
      });
    }
    fs::create_dir(&host).await?;
  }
  set_mode(&host, mode).await
}

async fn make_file(rootfs: &Path, path: &str, content: &str, mode: u32) -> Result<(), SolveError> {
  let host = resolve_in(rootfs, path);
  confine_async(rootfs, &host, path).await?;
  if host.is_dir() {
    return Err(SolveError::InvalidPath {
      path: clean_path(path),
      reason: "is a directory".to_string(),
    });
  }
  if !host.parent().is_some_and(Path::is_dir) {
    return Err(SolveError::InvalidPath {
      path: clean_path(path),
      reason: "parent directory does not exist".to_string(),
    });
  }
  fs::write(&host, content).await?;
  set_mode(&host, mode).await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), SolveError> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
  Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), SolveError> {
  Ok(())
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
  if path.is_dir() && !path.symlink_metadata()?.file_type().is_symlink() {
    std::fs::remove_dir_all(path)
  } else {
    std::fs::remove_file(path)
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::llb::ExecOpts;
  use crate::solver::ReadRequest;
  use crate::util::testutil::shell_cmd;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  struct Fixture {
    _temp: TempDir,
    store: PathBuf,
    src: PathBuf,
  }

  fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("store");
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("lib")).unwrap();
    std::fs::write(src.join("main.txt"), "main").unwrap();
    std::fs::write(src.join("lib/util.txt"), "util").unwrap();
    Fixture {
      _temp: temp,
      store,
      src,
    }
  }

  async fn read(r: &Arc<dyn Reference>, path: &str) -> String {
    let bytes = r.read_file(&Context::new(), ReadRequest::new(path)).await.unwrap();
    String::from_utf8(bytes).unwrap()
  }

  #[tokio::test]
  async fn local_and_copy_are_materialized() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store).with_local("src", &f.src);
    let state = State::scratch()
      .mkdir("/app", 0o755, true)
      .copy(&State::local("src"), "/lib", "/app/lib")
      .copy(&State::local("src"), "/main.txt", "/app");

    let out = solver.solve(&Context::new(), &state).await.unwrap();
    assert_eq!(read(&out, "/app/lib/util.txt").await, "util");
    assert_eq!(read(&out, "/app/main.txt").await, "main");
  }

  #[tokio::test]
  async fn exec_output_becomes_part_of_the_state() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let state = State::scratch()
      .mkfile("/in.txt", "abc", 0o644)
      .run(ExecOpts::new(shell_cmd("PATH=/usr/bin:/bin; cat in.txt in.txt > out.txt")));

    let out = solver.solve(&Context::new(), &state).await.unwrap();
    assert_eq!(read(&out, "/out.txt").await, "abcabc");
    let names: Vec<_> = out
      .read_dir(&Context::new(), "/")
      .await
      .unwrap()
      .into_iter()
      .map(|s| s.path)
      .collect();
    assert_eq!(names, vec!["in.txt", "out.txt"]);
  }

  #[tokio::test]
  async fn completed_objects_are_reused() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let marker_file = f.store.join("count");
    let script = format!("echo x >> {}", marker_file.display());
    let state = State::scratch().run(ExecOpts::new(shell_cmd(&script)));

    solver.solve(&Context::new(), &state).await.unwrap();
    solver.solve(&Context::new(), &state).await.unwrap();
    assert_eq!(std::fs::read_to_string(&marker_file).unwrap(), "x\n");

    let obj = f.store.join("obj").join(state.digest().unwrap().0);
    assert!(obj.join(OBJECT_COMPLETE_MARKER).exists());
  }

  #[tokio::test]
  #[traced_test]
  async fn corrupted_objects_are_rebuilt() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let state = State::scratch().mkfile("/a.txt", "good", 0o644);
    solver.solve(&Context::new(), &state).await.unwrap();

    let obj = f.store.join("obj").join(state.digest().unwrap().0);
    std::fs::write(obj.join("rootfs/a.txt"), "bad").unwrap();

    let out = solver.solve(&Context::new(), &state).await.unwrap();
    assert_eq!(read(&out, "/a.txt").await, "good");
    assert!(logs_contain("object corrupted, will rebuild"));
  }

  #[tokio::test]
  async fn corruption_below_a_nested_tmp_dir_is_detected() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let state = State::scratch().mkdir("/tmp", 0o755, false).mkfile("/tmp/a", "good", 0o644);
    solver.solve(&Context::new(), &state).await.unwrap();

    let obj = f.store.join("obj").join(state.digest().unwrap().0);
    std::fs::write(obj.join("rootfs/tmp/a"), "bad").unwrap();

    let out = solver.solve(&Context::new(), &state).await.unwrap();
    assert_eq!(read(&out, "/tmp/a").await, "good");
  }

  #[tokio::test(flavor = "current_thread")]
  async fn cache_checks_honor_cancellation() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let state = State::scratch().mkfile("/a.txt", "data", 0o644);
    solver.solve(&Context::new(), &state).await.unwrap();
    let obj = f.store.join("obj").join(state.digest().unwrap().0);

    assert!(cached(&obj).await.unwrap());

    let ctx = Context::new();
    ctx.cancel();
    let err = solver.solve(&ctx, &state).await.err().unwrap();
    assert!(matches!(err, SolveError::Context(_)));
    assert!(obj.join(OBJECT_COMPLETE_MARKER).exists());
  }

  #[tokio::test]
  async fn writes_through_escaping_symlinks_are_rejected() {
    let f = fixture();
    let outside = f.src.parent().unwrap().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, f.src.join("out")).unwrap();
    std::os::unix::fs::symlink("lib", f.src.join("inner")).unwrap();
    let solver = LocalSolver::new(&f.store).with_local("src", &f.src);
    let ctx = Context::new();
    let base = State::local("src");

    let escapes = [
      base.mkfile("/out/pwned", "x", 0o644),
      base.mkdir("/out/sub", 0o755, true),
      base.copy(&State::scratch().mkfile("/pwned", "x", 0o644), "/pwned", "/out"),
      base.copy(&State::scratch().mkdir("/d", 0o755, false).mkfile("/d/pwned", "x", 0o644), "/d", "/out"),
    ];
    for state in &escapes {
      let err = solver.solve(&ctx, state).await.err().unwrap();
      assert!(matches!(err, SolveError::InvalidPath { .. }), "unexpected error: {}", err);
    }
    assert_eq!(std::fs::read_dir(&outside).unwrap().count(), 0);

    let inside = base.mkfile("/inner/new.txt", "ok", 0o644);
    let out = solver.solve(&ctx, &inside).await.unwrap();
    assert_eq!(read(&out, "/lib/new.txt").await, "ok");
  }

  #[tokio::test]
  async fn editing_a_local_directory_invalidates_its_objects() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store).with_local("src", &f.src);
    let state = State::local("src");

    let first = solver.solve(&Context::new(), &state).await.unwrap();
    std::fs::write(f.src.join("main.txt"), "changed").unwrap();
    let second = solver.solve(&Context::new(), &state).await.unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(read(&second, "/main.txt").await, "changed");
  }

  #[tokio::test]
  async fn failures_are_reported() {
    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let ctx = Context::new();

    let missing = solver.solve(&ctx, &State::local("nope")).await.err().unwrap();
    assert!(matches!(missing, SolveError::MissingLocal(n) if n == "nope"));

    let failing = State::scratch().run(ExecOpts::new(shell_cmd("exit 2")));
    let err = solver.solve(&ctx, &failing).await.err().unwrap();
    assert!(matches!(err, SolveError::ExecFailed { code: Some(2), .. }));

    let no_parent = State::scratch().mkfile("/a/b.txt", "x", 0o644);
    let err = solver.solve(&ctx, &no_parent).await.err().unwrap();
    assert!(matches!(err, SolveError::InvalidPath { .. }));

    let no_source = State::scratch().copy(&State::scratch(), "/missing", "/");
    let err = solver.solve(&ctx, &no_source).await.err().unwrap();
    assert!(matches!(err, SolveError::CopySource(_)));
  }

  #[tokio::test]
  async fn modes_are_applied() {
    use std::os::unix::fs::PermissionsExt;

    let f = fixture();
    let solver = LocalSolver::new(&f.store);
    let state = State::scratch()
      .mkdir("/bin", 0o700, false)
      .mkfile("/bin/tool", "#!/bin/sh\n", 0o755);
    let out = solver.solve(&Context::new(), &state).await.unwrap();

    let stat = out.stat_file(&Context::new(), "/bin/tool").await.unwrap();
    assert_eq!(stat.permissions(), 0o755);
    let obj = f.store.join("obj").join(out.id()).join("rootfs/bin");
    assert_eq!(std::fs::metadata(obj).unwrap().permissions().mode() & 0o777, 0o700);
  }
}
