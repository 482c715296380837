//! Calculator host: engine interop, peripheral I/O and execution scheduling.
//!
//! Facade over the workspace crates. See [`host::Host`] for the front-end entry point.

#![forbid(unsafe_code)]

pub use hackcalc_engine as engine;
pub use hackcalc_host as host;
pub use hackcalc_io as io;
pub use hackcalc_shared as shared;
