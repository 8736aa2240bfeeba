//! Shared utilities: hashing, path normalization and test helpers.

pub mod hash;
pub mod path;

#[cfg(test)]
pub mod testutil;
