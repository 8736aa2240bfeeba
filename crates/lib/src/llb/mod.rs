//! Graph-construction expressions describing a desired filesystem state.
//!
//! A [`State`] is an immutable, content-hashed DAG of [`Vertex`] values. It is
//! the *input* half of a build-state handle ([`crate::fs::FS`]): cheap to
//! clone, cheap to extend (every builder method returns a new `State` sharing
//! the old graph), and only turned into content when a solver realizes it.
//!
//! ```
//! use strata_lib::llb::{ExecOpts, State};
//!
//! let site = State::local("site");
//! let image = State::scratch()
//!   .mkdir("/srv", 0o755, true)
//!   .copy(&site, "/", "/srv/www")
//!   .run(ExecOpts::new(["/bin/sh", "-c", "ls /srv/www > index.txt"]).with_cwd("/srv"));
//!
//! assert_eq!(image.local_names().into_iter().collect::<Vec<_>>(), vec!["site".to_string()]);
//! ```

mod types;

pub use types::*;
