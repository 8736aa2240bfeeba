//! Shared constants.

/// Length of the truncated hex digest used for store object names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Table field holding an operation's tag in a compiled value.
pub const OP_TAG_FIELD: &str = "op";

/// Marker file written next to a realized object once it is complete.
pub const OBJECT_COMPLETE_MARKER: &str = ".strata-complete";

/// Directory inside a store object holding the materialized filesystem.
pub const OBJECT_ROOTFS_DIR: &str = "rootfs";

/// Environment variable overriding the store location.
pub const STORE_ENV: &str = "STRATA_STORE";

/// Environment variable holding the default solve timeout, in seconds.
pub const TIMEOUT_ENV: &str = "STRATA_TIMEOUT_SECS";

/// Unix file type bits.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;
