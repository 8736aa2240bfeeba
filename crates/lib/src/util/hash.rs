//! Content addressing for graph vertices and realized store objects.
//!
//! - [`ObjectHash`]: truncated digest naming a [`State`](crate::llb::State) and its store object
//! - [`ContentHash`]: full digest of a realized filesystem tree, recorded in the completion marker

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// Digest identifying a graph vertex and, once solved, its store object.
///
/// A lowercase hex string of [`OBJ_HASH_PREFIX_LEN`] characters taken from the
/// SHA-256 of the canonical JSON form. Maps inside vertices are `BTreeMap`s so
/// the serialization, and therefore the digest, is stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    Ok(ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// Full 64-character SHA-256 of a materialized tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeHashError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },

  #[error("failed to read {path}: {message}")]
  Read { path: String, message: String },
}

/// Hash a directory tree: relative paths, file contents, permission bits and
/// symlink targets. Timestamps and ownership are ignored.
///
/// Top-level entries of `root` whose file name appears in `exclude` are
/// skipped along with their subtrees. Deeper entries are always hashed.
pub fn hash_tree(root: &Path, exclude: &[&str]) -> Result<ContentHash, TreeHashError> {
  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() != 1 || e.file_name().to_str().is_none_or(|name| !exclude.contains(&name)));

  let mut hasher = Sha256::new();
  for entry in walker {
    let entry = entry.map_err(|e| TreeHashError::Walk {
      path: root.display().to_string(),
      message: e.to_string(),
    })?;
    let rel = entry
      .path()
      .strip_prefix(root)
      .unwrap_or(entry.path())
      .to_string_lossy()
      .replace('\\', "/");

    let file_type = entry.file_type();
    let line = if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(|e| read_error(entry.path(), e))?;
      format!("L:{}:{}", rel, target.to_string_lossy())
    } else if file_type.is_dir() {
      format!("D:{}:{:o}", rel, permission_bits(entry.path()))
    } else if file_type.is_file() {
      format!(
        "F:{}:{:o}:{}",
        rel,
        permission_bits(entry.path()),
        hash_file(entry.path())?
      )
    } else {
      continue;
    };
    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// SHA-256 of one file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, TreeHashError> {
  let mut file = fs::File::open(path).map_err(|e| read_error(path, e))?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let n = file.read(&mut buffer).map_err(|e| read_error(path, e))?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }
  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

fn read_error(path: &Path, e: std::io::Error) -> TreeHashError {
  TreeHashError::Read {
    path: path.display().to_string(),
    message: e.to_string(),
  }
}

#[cfg(unix)]
fn permission_bits(path: &Path) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  fs::symlink_metadata(path)
    .map(|m| m.permissions().mode() & 0o7777)
    .unwrap_or(0)
}

#[cfg(not(unix))]
fn permission_bits(path: &Path) -> u32 {
  match fs::symlink_metadata(path) {
    Ok(m) if m.permissions().readonly() => 0o444,
    Ok(_) => 0o644,
    Err(_) => 0,
  }
}
