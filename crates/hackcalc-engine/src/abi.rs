//! Export and import names of an engine WebAssembly module.
//!
//! Pointers and lengths are `i32` (wasm32). Filenames are passed as NUL-terminated strings in
//! engine-owned buffers.
//!
//! | export                    | signature                         |
//! |---------------------------|-----------------------------------|
//! | `malloc`                  | `(len) -> ptr`                    |
//! | `free`                    | `(ptr)`                           |
//! | `Init`                    | `()`                              |
//! | `Reset`                   | `()`                              |
//! | `Clear`                   | `()`                              |
//! | `SetMemoryPtr`            | `(ptr)`                           |
//! | `CompileFile`             | `(name, src, len) -> vm_len`      |
//! | `GetVmCodeString`         | `(name, dest)`                    |
//! | `TranslateFile`           | `(name)`                          |
//! | `GetAssemblyLength`       | `() -> len`                       |
//! | `GetAssembly`             | `(dest)`                          |
//! | `Assemble`                | `()`                              |
//! | `GetMachineCode`          | `(dest, lane)`                    |
//! | `InitializeExecution`     | `() -> ok`                        |
//! | `Execute`                 | `(steps) -> halted`               |
//! | `SetKey`                  | `(code)`                          |
//!
//! The module must export its linear memory as `memory`. It may import `env.log(ptr, len)` to
//! emit console lines, and may export `_initialize`, which is called once after instantiation.

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_INITIALIZE: &str = "_initialize";

pub const EXPORT_MALLOC: &str = "malloc";
pub const EXPORT_FREE: &str = "free";

pub const EXPORT_INIT: &str = "Init";
pub const EXPORT_RESET: &str = "Reset";
pub const EXPORT_CLEAR: &str = "Clear";
pub const EXPORT_SET_MEMORY_PTR: &str = "SetMemoryPtr";
pub const EXPORT_COMPILE_FILE: &str = "CompileFile";
pub const EXPORT_GET_VM_CODE: &str = "GetVmCodeString";
pub const EXPORT_TRANSLATE_FILE: &str = "TranslateFile";
pub const EXPORT_GET_ASSEMBLY_LENGTH: &str = "GetAssemblyLength";
pub const EXPORT_GET_ASSEMBLY: &str = "GetAssembly";
pub const EXPORT_ASSEMBLE: &str = "Assemble";
pub const EXPORT_GET_MACHINE_CODE: &str = "GetMachineCode";
pub const EXPORT_INITIALIZE_EXECUTION: &str = "InitializeExecution";
pub const EXPORT_EXECUTE: &str = "Execute";
pub const EXPORT_SET_KEY: &str = "SetKey";

pub const IMPORT_MODULE: &str = "env";
pub const IMPORT_LOG: &str = "log";

/// `tracing` target that engine console output is forwarded to.
pub const CONSOLE_TARGET: &str = "hackcalc::engine";
