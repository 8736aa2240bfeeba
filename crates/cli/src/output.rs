//! Terminal output helpers shared by the commands.
//!
//! Status lines go to stdout, errors to stderr. Colors are only emitted when
//! the target stream supports them.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  /// Human readable
  #[default]
  Text,
  /// One pretty-printed JSON document on stdout
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    self == OutputFormat::Json
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Human readable size with binary units and one decimal above bytes.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.as_millis()),
    1..=59 => format!("{:.2}s", duration.as_secs_f64()),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}

pub fn print_success(message: &str) {
  println!("{} {}", symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn print_info(message: &str) {
  println!("{} {}", symbols::INFO.if_supports_color(Stream::Stdout, |s| s.cyan()), message);
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.bold())
  );
}

/// An indented `label: value` line under a status message.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
