//! Test utilities for strata-lib.
//!
//! Cross-platform helpers for tests that run commands through `exec` vertices.

/// Arguments running a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}

/// Arguments printing `msg` on stdout.
#[cfg(unix)]
pub fn echo_msg(msg: &str) -> Vec<String> {
  vec!["/bin/echo".to_string(), msg.to_string()]
}

#[cfg(windows)]
pub fn echo_msg(msg: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), format!("echo {}", msg)]
}
