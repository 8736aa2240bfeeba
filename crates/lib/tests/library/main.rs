//! Library integration tests.

mod common;
mod fs_tests;
mod op_tests;
mod pipeline_tests;
#[cfg(unix)]
mod store_tests;
