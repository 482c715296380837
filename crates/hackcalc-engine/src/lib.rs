//! Call contract of the compile/assemble/execute engine.
//!
//! The engine is an opaque collaborator: a compiler for the high-level language, a translator
//! from intermediate code to assembly, an assembler, and a CPU interpreter, all sharing one
//! linear memory. The host drives it exclusively through [`Engine`], which extends
//! [`hackcalc_shared::EngineMemory`] so byte payloads can be exchanged through
//! [`hackcalc_shared::SharedBuffer`]s.
//!
//! [`WasmEngine`] hosts an engine compiled to WebAssembly; see [`abi`] for the module ABI.

#![forbid(unsafe_code)]

pub mod abi;
mod contract;
mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(all(feature = "wasmtime", not(target_arch = "wasm32")))]
mod wasmtime_backend;

pub use contract::{Engine, COMPILE_REJECTED};
pub use error::{EngineError, Result};

#[cfg(all(feature = "wasmtime", not(target_arch = "wasm32")))]
pub use wasmtime_backend::WasmEngine;
