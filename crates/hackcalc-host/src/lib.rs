//! Host side of the calculator: drives an [`hackcalc_engine::Engine`] through compilation and
//! per-tick execution.
//!
//! - [`CompilationSession`] runs the compile → translate → assemble → extract pipeline over an
//!   ordered file set.
//! - [`Scheduler`] publishes the key code, runs a bounded number of engine steps and decodes the
//!   display once per tick.
//! - [`Host`] owns the engine, the memory window and both of the above, and is what a front-end
//!   talks to.

#![forbid(unsafe_code)]

mod config;
mod host;
mod pipeline;
mod scheduler;

pub use config::{ConfigError, HostConfig};
pub use host::{Host, HostError};
pub use pipeline::{
    artifact_name, CompilationSession, FileOutcome, InMemorySources, PipelineError,
    PipelineOutcome, PipelineState, SourceFile, SourceReader,
};
pub use scheduler::{RunState, Scheduler, TickReport};

#[cfg(not(target_arch = "wasm32"))]
pub use pipeline::FsSourceReader;
