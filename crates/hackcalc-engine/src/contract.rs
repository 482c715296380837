use hackcalc_shared::{EngineMemory, EnginePtr, ShortWord};

use crate::Result;

/// Return value of [`Engine::compile`] for a rejected source file.
///
/// Any negative value means rejection; this is the one engines are expected to use.
pub const COMPILE_REJECTED: i32 = -1;

/// Operations the host may invoke on an engine.
///
/// Every pointer argument refers to an allocation in the engine's own memory (see
/// [`EngineMemory`]). Destination buffers are sized by the caller: intermediate code by the
/// length returned from [`Engine::compile`], assembly by [`Engine::assembly_length`], machine
/// code by the ROM size.
///
/// Calls are synchronous and must not be issued concurrently.
pub trait Engine: EngineMemory {
    /// One-time engine setup. Called once at startup before any other operation.
    fn init(&mut self) -> Result<()>;

    /// Restart the loaded program from its first instruction.
    fn reset(&mut self) -> Result<()>;

    /// Discard all per-file compilation state before a new file set is compiled.
    fn clear(&mut self) -> Result<()>;

    /// Hand the engine the base of the host-visible RAM window.
    fn set_memory_base(&mut self, base: EnginePtr) -> Result<()>;

    /// Compile one source file held in `source[..len]`.
    ///
    /// Returns the byte length of the produced intermediate code, or a negative value if the file
    /// was rejected.
    fn compile(&mut self, filename: &str, source: EnginePtr, len: usize) -> Result<i32>;

    /// Copy the intermediate code of a compiled file into `dest`.
    fn fetch_intermediate_code(&mut self, filename: &str, dest: EnginePtr) -> Result<()>;

    /// Translate a compiled file's intermediate code and append it to the engine's assembly.
    fn translate(&mut self, filename: &str) -> Result<()>;

    /// Length in bytes of the accumulated assembly text.
    fn assembly_length(&mut self) -> Result<i32>;

    fn fetch_assembly(&mut self, dest: EnginePtr) -> Result<()>;

    /// Assemble the accumulated assembly into ROM.
    fn assemble(&mut self) -> Result<()>;

    /// Copy byte lane `lane` of every ROM word into `dest` (ROM-size bytes).
    fn fetch_machine_code(&mut self, dest: EnginePtr, lane: usize) -> Result<()>;

    /// Prepare the CPU to run the assembled program. Returns `false` if the engine refuses.
    fn initialize_execution(&mut self) -> Result<bool>;

    /// Run at most `budget` instructions. Returns `true` once the program has halted.
    fn execute_steps(&mut self, budget: u32) -> Result<bool>;

    /// Store a key code in the engine's keyboard register.
    fn set_key(&mut self, code: ShortWord) -> Result<()>;

    /// Drain console lines emitted by the engine since the last call.
    fn take_console(&mut self) -> Vec<String> {
        Vec::new()
    }
}
