//! References into realized store objects.

use std::fs::Metadata;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::exec::resolve_in;
use super::{FileRange, ReadError, ReadRequest, Reference};
use crate::context::Context;
use crate::fs::Stat;
use crate::util::path::{base_name, clean_path};

/// A realized filesystem on disk, addressed by its graph digest.
///
/// Reads never leave `root`: paths are resolved inside it and anything that
/// escapes through a symlink is reported as not found.
#[derive(Debug, Clone)]
pub struct StoreRef {
  id: String,
  root: PathBuf,
}

impl StoreRef {
  pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
    Self {
      id: id.into(),
      root: root.into(),
    }
  }

  /// Host directory holding the filesystem.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Resolve `path` to a host path, following symlinks, confined to the root.
  fn host_path(&self, path: &str) -> Result<PathBuf, ReadError> {
    let not_found = || ReadError::NotFound(clean_path(path));
    let candidate = resolve_in(&self.root, path);
    let resolved = std::fs::canonicalize(&candidate).map_err(|_| not_found())?;
    let root = std::fs::canonicalize(&self.root).map_err(|_| not_found())?;
    if !resolved.starts_with(&root) {
      return Err(not_found());
    }
    Ok(resolved)
  }
}

#[async_trait]
impl Reference for StoreRef {
  fn id(&self) -> &str {
    &self.id
  }

  async fn read_file(&self, ctx: &Context, req: ReadRequest) -> Result<Vec<u8>, ReadError> {
    ctx.check()?;
    let host = self.host_path(&req.filename)?;
    if host.is_dir() {
      return Err(ReadError::IsADirectory(clean_path(&req.filename)));
    }
    let range = req.range;
    let content = tokio::task::spawn_blocking(move || read_range(&host, range))
      .await
      .map_err(std::io::Error::other)??;
    Ok(content)
  }

  async fn read_dir(&self, ctx: &Context, dir: &str) -> Result<Vec<Stat>, ReadError> {
    ctx.check()?;
    let host = self.host_path(dir)?;
    if !host.is_dir() {
      return Err(ReadError::NotADirectory(clean_path(dir)));
    }

    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(&host).await?;
    while let Some(entry) = reader.next_entry().await? {
      let name = entry.file_name().to_string_lossy().into_owned();
      let metadata = tokio::fs::symlink_metadata(entry.path()).await?;
      entries.push(stat_from(&name, &entry.path(), &metadata));
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
  }

  async fn stat_file(&self, ctx: &Context, path: &str) -> Result<Stat, ReadError> {
    ctx.check()?;
    let name = base_name(path).unwrap_or_else(|| "/".to_string());
    // Stat the entry itself, so only its parent has to resolve inside the root.
    let parent = self.host_path(&format!("{}/..", clean_path(path)))?;
    let host = match base_name(path) {
      Some(base) => parent.join(base),
      None => parent,
    };
    let metadata = tokio::fs::symlink_metadata(&host)
      .await
      .map_err(|_| ReadError::NotFound(clean_path(path)))?;
    Ok(stat_from(&name, &host, &metadata))
  }
}

fn read_range(path: &Path, range: Option<FileRange>) -> Result<Vec<u8>, ReadError> {
  let mut file = std::fs::File::open(path)?;
  let mut content = Vec::new();
  match range {
    None => {
      file.read_to_end(&mut content)?;
    }
    Some(FileRange { offset, length }) => {
      file.seek(SeekFrom::Start(offset))?;
      file.take(length).read_to_end(&mut content)?;
    }
  }
  Ok(content)
}

#[cfg(unix)]
fn stat_from(name: &str, path: &Path, metadata: &Metadata) -> Stat {
  use std::os::unix::fs::MetadataExt;

  let linkname = if metadata.file_type().is_symlink() {
    std::fs::read_link(path)
      .map(|t| t.to_string_lossy().into_owned())
      .unwrap_or_default()
  } else {
    String::new()
  };
  Stat {
    path: name.to_string(),
    mode: metadata.mode(),
    size: metadata.size(),
    uid: metadata.uid(),
    gid: metadata.gid(),
    mod_time: metadata.mtime() * 1_000_000_000 + metadata.mtime_nsec(),
    linkname,
  }
}

#[cfg(not(unix))]
fn stat_from(name: &str, path: &Path, metadata: &Metadata) -> Stat {
  let file_type = metadata.file_type();
  let mut stat = if file_type.is_symlink() {
    let target = std::fs::read_link(path)
      .map(|t| t.to_string_lossy().into_owned())
      .unwrap_or_default();
    Stat::symlink(name, target)
  } else if file_type.is_dir() {
    Stat::dir(name, 0o755)
  } else {
    let perm = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
    Stat::file(name, perm, metadata.len())
  };
  stat.mod_time = metadata
    .modified()
    .ok()
    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
    .map(|d| d.as_nanos() as i64)
    .unwrap_or(0);
  stat
}
