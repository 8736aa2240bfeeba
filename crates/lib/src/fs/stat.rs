use serde::{Deserialize, Serialize};

use crate::consts::{S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};

/// One entry of a directory listing.
///
/// `path` is the entry's name relative to the listed directory; it is never
/// `.` or `..`. Values are produced fresh by every listing and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
  pub path: String,
  /// Unix file type and permission bits.
  pub mode: u32,
  pub size: u64,
  pub uid: u32,
  pub gid: u32,
  /// Nanoseconds since the unix epoch.
  pub mod_time: i64,
  /// Symlink target, empty for other entry types.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub linkname: String,
}

impl Stat {
  pub fn dir(path: impl Into<String>, permissions: u32) -> Self {
    Self::with_type(path, S_IFDIR | (permissions & 0o7777), 0)
  }

  pub fn file(path: impl Into<String>, permissions: u32, size: u64) -> Self {
    Self::with_type(path, S_IFREG | (permissions & 0o7777), size)
  }

  pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
    let linkname = target.into();
    let mut stat = Self::with_type(path, S_IFLNK | 0o777, linkname.len() as u64);
    stat.linkname = linkname;
    stat
  }

  fn with_type(path: impl Into<String>, mode: u32, size: u64) -> Self {
    Self {
      path: path.into(),
      mode,
      size,
      uid: 0,
      gid: 0,
      mod_time: 0,
      linkname: String::new(),
    }
  }

  pub fn is_dir(&self) -> bool {
    self.mode & S_IFMT == S_IFDIR
  }

  pub fn is_file(&self) -> bool {
    self.mode & S_IFMT == S_IFREG
  }

  pub fn is_symlink(&self) -> bool {
    self.mode & S_IFMT == S_IFLNK
  }

  pub fn permissions(&self) -> u32 {
    self.mode & 0o7777
  }
}
