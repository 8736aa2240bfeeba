//! strata-lib: lazily solved build states driven by declarative operations.
//!
//! - `compile`: Lua configurations compiled into plain values
//! - `op`: tagged operation trees, schema validation and traversal
//! - `pipeline`: operation scripts turned into build-state changes
//! - `llb`: immutable, content-addressed build graphs
//! - `fs`: the build-state handle, solving lazily and reading its output
//! - `solver`: in-memory and on-disk solvers

pub mod compile;
pub mod config;
pub mod consts;
pub mod context;
pub mod fs;
pub mod llb;
pub mod op;
pub mod pipeline;
pub mod solver;
pub mod util;
