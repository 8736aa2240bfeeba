//! Slash-separated path handling for paths inside a build state.
//!
//! Paths inside a state are always interpreted relative to its root, so `..`
//! can never climb above `/`.

/// Normalize `path` into an absolute, slash-separated form.
///
/// Empty components and `.` are dropped, `..` pops a component (stopping at the
/// root) and backslashes are treated as separators.
pub fn clean_path(path: &str) -> String {
  let mut parts: Vec<&str> = Vec::new();
  for component in path.split(['/', '\\']) {
    match component {
      "" | "." => {}
      ".." => {
        parts.pop();
      }
      other => parts.push(other),
    }
  }
  format!("/{}", parts.join("/"))
}

/// Join a directory and an entry name the way directory walks report paths.
pub fn join(dir: &str, name: &str) -> String {
  clean_path(&format!("{}/{}", dir, name))
}

/// Components of a cleaned path, excluding the root.
pub fn components(path: &str) -> Vec<String> {
  clean_path(path)
    .split('/')
    .filter(|c| !c.is_empty())
    .map(str::to_string)
    .collect()
}

/// Last component of a path, or `None` for the root.
pub fn base_name(path: &str) -> Option<String> {
  components(path).pop()
}
