mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{LocalArg, cmd_build, cmd_cat, cmd_plan, cmd_validate};
use crate::output::{OutputFormat, print_error};

/// strata - lazy filesystem builds described in Lua
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Object store directory
  #[arg(long, global = true, env = "STRATA_STORE")]
  store: Option<PathBuf>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a build file against the operation schemas
  Validate {
    /// Path to the build file
    file: PathBuf,

    /// Validate the value as a single operation of this schema (e.g. #Copy)
    #[arg(short, long)]
    schema: Option<String>,

    /// Dotted path to the value inside the returned table
    #[arg(short, long)]
    path: Option<String>,
  },

  /// Show the operations of a build file and the state they produce
  Plan {
    /// Path to the build file
    file: PathBuf,

    /// Dotted path to the value inside the returned table
    #[arg(short, long)]
    path: Option<String>,
  },

  /// Solve a build file into the object store
  Build {
    /// Path to the build file
    file: PathBuf,

    /// Dotted path to the value inside the returned table
    #[arg(short, long)]
    path: Option<String>,

    /// Host directory for a local import (NAME=DIR)
    #[arg(short, long = "local", value_name = "NAME=DIR")]
    locals: Vec<LocalArg>,

    /// List every entry of the result
    #[arg(long)]
    list: bool,
  },

  /// Print one file from the built result
  Cat {
    /// Path to the build file
    file: PathBuf,

    /// File inside the result
    target: String,

    /// Dotted path to the value inside the returned table
    #[arg(short, long)]
    path: Option<String>,

    /// Host directory for a local import (NAME=DIR)
    #[arg(short, long = "local", value_name = "NAME=DIR")]
    locals: Vec<LocalArg>,
  },
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(err) = run(cli) {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}

fn init_logging(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let store = cli.store;
  let output = cli.output;
  match cli.command {
    Commands::Validate { file, schema, path } => cmd_validate(&file, schema.as_deref(), path.as_deref(), output),
    Commands::Plan { file, path } => cmd_plan(&file, path.as_deref(), output),
    Commands::Build {
      file,
      path,
      locals,
      list,
    } => cmd_build(&file, path.as_deref(), &locals, store, list, output),
    Commands::Cat {
      file,
      target,
      path,
      locals,
    } => cmd_cat(&file, &target, path.as_deref(), &locals, store),
  }
}
