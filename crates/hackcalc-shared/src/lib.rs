//! Host-side view of engine memory.
//!
//! The engine (compiler, assembler and CPU interpreter) lives behind a foreign memory boundary:
//! it owns a linear heap that the host can only reach through explicit allocate/copy/free calls.
//! This crate provides the pieces both sides agree on:
//!
//! - [`ShortWord`]: the engine's memory cell type (16-bit, or 32-bit with the `word32` feature).
//! - [`EngineMemory`]: the minimal allocate/free/read/write surface of an engine heap.
//! - [`SharedBuffer`]: a one-shot byte transfer region with an explicit, scoped lifetime.
//! - [`MemoryWindow`]: the long-lived RAM span mirrored between host and engine.

#![forbid(unsafe_code)]

mod heap;
pub mod layout;
mod memory;
mod shared_buffer;
mod window;
mod word;

pub use heap::VecHeap;
pub use memory::{EngineMemory, EnginePtr, MemoryError, Result};
pub use shared_buffer::{with_shared_buffer, with_zeroed_buffer, SharedBuffer};
pub use window::MemoryWindow;
pub use word::{word_from_le_bytes, word_to_le_bytes, ShortWord, WORD_BYTES};
