//! In-process engine for host-side tests.
//!
//! [`ScriptedEngine`] implements the full [`Engine`] contract over a [`VecHeap`] without running
//! a real compiler or CPU. Each source file is "compiled" by echoing its text as intermediate
//! code unless it has been scripted to fail; execution halts after a configurable number of
//! steps. Every contract call is recorded so tests can assert on call order.

use std::collections::{BTreeMap, BTreeSet};

use hackcalc_shared::layout::{DISPLAY_BASE, KEY_CELL, ROM_WORDS};
use hackcalc_shared::{
    word_to_le_bytes, EngineMemory, EnginePtr, ShortWord, VecHeap, WORD_BYTES,
};

use crate::{Engine, EngineError, Result, COMPILE_REJECTED};

/// Heap size of [`ScriptedEngine::new`]; room for the RAM window and a full machine-code stream.
pub const DEFAULT_HEAP_BYTES: usize = 1 << 20;

/// Key code the scripted CPU ignores when echoing keys to the display.
const BLANK_KEY: ShortWord = 19;

/// A recorded contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Init,
    Reset,
    Clear,
    SetMemoryBase(EnginePtr),
    Compile(String),
    FetchIntermediateCode(String),
    Translate(String),
    AssemblyLength,
    FetchAssembly,
    Assemble,
    FetchMachineCode(usize),
    InitializeExecution,
    Execute(u32),
    SetKey(ShortWord),
}

#[derive(Debug)]
pub struct ScriptedEngine {
    heap: VecHeap,
    calls: Vec<EngineCall>,
    console: Vec<String>,
    rejected: BTreeSet<String>,
    intermediate: BTreeMap<String, String>,
    assembly: String,
    program: Vec<u32>,
    memory_base: Option<EnginePtr>,
    refuse_execution: bool,
    halt_after: Option<u64>,
    steps_run: u64,
    fail_alloc_after: Option<u64>,
    trap_on: Option<&'static str>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::with_heap_bytes(DEFAULT_HEAP_BYTES)
    }

    pub fn with_heap_bytes(bytes: usize) -> Self {
        Self {
            heap: VecHeap::new(bytes),
            calls: Vec::new(),
            console: Vec::new(),
            rejected: BTreeSet::new(),
            intermediate: BTreeMap::new(),
            assembly: String::new(),
            program: Vec::new(),
            memory_base: None,
            refuse_execution: false,
            halt_after: None,
            steps_run: 0,
            fail_alloc_after: None,
            trap_on: None,
        }
    }

    /// Make [`Engine::compile`] reject `filename`.
    pub fn reject(mut self, filename: &str) -> Self {
        self.rejected.insert(filename.to_owned());
        self
    }

    /// Halt once `steps` instructions have run in total since the last reset.
    pub fn halt_after(mut self, steps: u64) -> Self {
        self.halt_after = Some(steps);
        self
    }

    /// Make [`Engine::initialize_execution`] return `false`.
    pub fn refuse_execution(mut self) -> Self {
        self.refuse_execution = true;
        self
    }

    /// Fail every allocation after the first `count` successful ones.
    pub fn fail_alloc_after(mut self, count: u64) -> Self {
        self.fail_alloc_after = Some(count);
        self
    }

    /// Trap whenever the named contract call is made (e.g. `"Translate"`).
    pub fn trap_on(mut self, call: &'static str) -> Self {
        self.trap_on = Some(call);
        self
    }

    pub fn heap(&self) -> &VecHeap {
        &self.heap
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn count_calls(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn memory_base(&self) -> Option<EnginePtr> {
        self.memory_base
    }

    /// Total instructions run since the last reset.
    pub fn steps_run(&self) -> u64 {
        self.steps_run
    }

    fn record(&mut self, call: EngineCall, name: &'static str) -> Result<()> {
        self.calls.push(call);
        if self.trap_on == Some(name) {
            return Err(EngineError::Trap {
                call: name,
                message: "scripted trap".into(),
            });
        }
        Ok(())
    }

    fn cell_ptr(&self, cell: usize) -> Option<EnginePtr> {
        self.memory_base?.offset(cell * WORD_BYTES)
    }

    fn read_cell(&self, cell: usize) -> Result<Option<ShortWord>> {
        let Some(ptr) = self.cell_ptr(cell) else {
            return Ok(None);
        };
        let mut bytes = [0u8; WORD_BYTES];
        self.heap.read(ptr, &mut bytes)?;
        Ok(Some(hackcalc_shared::word_from_le_bytes(bytes)))
    }

    fn write_cell(&mut self, cell: usize, value: ShortWord) -> Result<()> {
        if let Some(ptr) = self.cell_ptr(cell) {
            self.heap.write(ptr, &word_to_le_bytes(value))?;
        }
        Ok(())
    }
}

impl EngineMemory for ScriptedEngine {
    fn alloc(&mut self, len: usize) -> hackcalc_shared::Result<EnginePtr> {
        if self
            .fail_alloc_after
            .is_some_and(|limit| self.heap.allocations() >= limit)
        {
            return Err(hackcalc_shared::MemoryError::OutOfMemory { len });
        }
        self.heap.alloc(len)
    }

    fn free(&mut self, ptr: EnginePtr) -> hackcalc_shared::Result<()> {
        self.heap.free(ptr)
    }

    fn read(&self, ptr: EnginePtr, dst: &mut [u8]) -> hackcalc_shared::Result<()> {
        self.heap.read(ptr, dst)
    }

    fn write(&mut self, ptr: EnginePtr, src: &[u8]) -> hackcalc_shared::Result<()> {
        self.heap.write(ptr, src)
    }
}

impl Engine for ScriptedEngine {
    fn init(&mut self) -> Result<()> {
        self.record(EngineCall::Init, "Init")
    }

    fn reset(&mut self) -> Result<()> {
        self.record(EngineCall::Reset, "Reset")?;
        self.steps_run = 0;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record(EngineCall::Clear, "Clear")?;
        self.intermediate.clear();
        self.assembly.clear();
        self.program.clear();
        self.steps_run = 0;
        Ok(())
    }

    fn set_memory_base(&mut self, base: EnginePtr) -> Result<()> {
        self.record(EngineCall::SetMemoryBase(base), "SetMemoryBase")?;
        self.memory_base = Some(base);
        Ok(())
    }

    fn compile(&mut self, filename: &str, source: EnginePtr, len: usize) -> Result<i32> {
        self.record(EngineCall::Compile(filename.to_owned()), "Compile")?;
        if self.rejected.contains(filename) {
            self.console.push(format!("Error compiling {filename}"));
            return Ok(COMPILE_REJECTED);
        }
        let mut bytes = vec![0u8; len];
        self.heap.read(source, &mut bytes)?;
        let code = String::from_utf8_lossy(&bytes).into_owned();
        let vm_len = i32::try_from(code.len()).map_err(|_| EngineError::Protocol {
            call: "Compile",
            message: "source too large".into(),
        })?;
        self.intermediate.insert(filename.to_owned(), code);
        self.console.push(format!("Compiled {filename}"));
        Ok(vm_len)
    }

    fn fetch_intermediate_code(&mut self, filename: &str, dest: EnginePtr) -> Result<()> {
        self.record(
            EngineCall::FetchIntermediateCode(filename.to_owned()),
            "FetchIntermediateCode",
        )?;
        let code = self.intermediate.get(filename).cloned().unwrap_or_default();
        self.heap.write(dest, code.as_bytes())?;
        Ok(())
    }

    fn translate(&mut self, filename: &str) -> Result<()> {
        self.record(EngineCall::Translate(filename.to_owned()), "Translate")?;
        if let Some(code) = self.intermediate.get(filename) {
            self.assembly.push_str(&format!("// {filename}\n{code}\n"));
        }
        self.console.push(format!("Translated {filename}"));
        Ok(())
    }

    fn assembly_length(&mut self) -> Result<i32> {
        self.record(EngineCall::AssemblyLength, "AssemblyLength")?;
        i32::try_from(self.assembly.len()).map_err(|_| EngineError::Protocol {
            call: "AssemblyLength",
            message: "assembly too large".into(),
        })
    }

    fn fetch_assembly(&mut self, dest: EnginePtr) -> Result<()> {
        self.record(EngineCall::FetchAssembly, "FetchAssembly")?;
        self.heap.write(dest, self.assembly.as_bytes())?;
        Ok(())
    }

    fn assemble(&mut self) -> Result<()> {
        self.record(EngineCall::Assemble, "Assemble")?;
        // One instruction word per assembly line, numbered from 1 so lanes are never all zero.
        self.program = (1..=self.assembly.lines().count() as u32).collect();
        self.console.push("Assembled program".to_owned());
        Ok(())
    }

    fn fetch_machine_code(&mut self, dest: EnginePtr, lane: usize) -> Result<()> {
        self.record(EngineCall::FetchMachineCode(lane), "FetchMachineCode")?;
        let mut bytes = vec![0u8; ROM_WORDS];
        for (byte, word) in bytes.iter_mut().zip(&self.program) {
            *byte = word.to_le_bytes().get(lane).copied().unwrap_or(0);
        }
        self.heap.write(dest, &bytes)?;
        Ok(())
    }

    fn initialize_execution(&mut self) -> Result<bool> {
        self.record(EngineCall::InitializeExecution, "InitializeExecution")?;
        self.steps_run = 0;
        Ok(!self.refuse_execution)
    }

    /// Advances the step counter and echoes the key cell into the rightmost display digit
    /// whenever a key other than blank is held.
    fn execute_steps(&mut self, budget: u32) -> Result<bool> {
        self.record(EngineCall::Execute(budget), "Execute")?;
        self.steps_run += u64::from(budget);
        if let Some(key) = self.read_cell(KEY_CELL)? {
            if key != BLANK_KEY {
                self.write_cell(DISPLAY_BASE, key + 1)?;
            }
        }
        Ok(self.halt_after.is_some_and(|limit| self.steps_run >= limit))
    }

    fn set_key(&mut self, code: ShortWord) -> Result<()> {
        self.record(EngineCall::SetKey(code), "SetKey")?;
        self.write_cell(KEY_CELL, code)
    }

    fn take_console(&mut self) -> Vec<String> {
        std::mem::take(&mut self.console)
    }
}
