use std::path::Path;

use hackcalc_shared::{with_shared_buffer, EngineMemory, EnginePtr, MemoryError, ShortWord};
use wasmtime::{
    Caller, Config, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams, WasmResults,
};

use crate::abi;
use crate::{Engine, EngineError, Result};

#[derive(Debug, Default)]
struct HostState {
    console: Vec<String>,
}

struct Exports {
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
    init: TypedFunc<(), ()>,
    reset: TypedFunc<(), ()>,
    clear: TypedFunc<(), ()>,
    set_memory_ptr: TypedFunc<i32, ()>,
    compile_file: TypedFunc<(i32, i32, i32), i32>,
    get_vm_code: TypedFunc<(i32, i32), ()>,
    translate_file: TypedFunc<i32, ()>,
    get_assembly_length: TypedFunc<(), i32>,
    get_assembly: TypedFunc<i32, ()>,
    assemble: TypedFunc<(), ()>,
    get_machine_code: TypedFunc<(i32, i32), ()>,
    initialize_execution: TypedFunc<(), i32>,
    execute: TypedFunc<i32, i32>,
    set_key: TypedFunc<i32, ()>,
}

/// Engine compiled to WebAssembly, hosted with `wasmtime`.
///
/// The module's exported linear memory is the engine memory; allocations go through the module's
/// own `malloc`/`free`. Console lines written through the `env.log` import are forwarded to
/// `tracing` (target [`abi::CONSOLE_TARGET`]) and buffered for [`Engine::take_console`].
pub struct WasmEngine {
    store: Store<HostState>,
    memory: Memory,
    exports: Exports,
}

impl WasmEngine {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Compile and instantiate an engine module from its binary encoding.
    pub fn from_bytes(wasm: &[u8]) -> Result<Self> {
        let config = Config::new();
        let engine =
            wasmtime::Engine::new(&config).map_err(|e| EngineError::Load(e.to_string()))?;
        let module = Module::new(&engine, wasm).map_err(|e| EngineError::Load(e.to_string()))?;

        let mut store = Store::new(&engine, HostState::default());
        let mut linker = Linker::new(&engine);
        define_console(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| EngineError::Load(e.to_string()))?;
        let memory = instance
            .get_memory(&mut store, abi::EXPORT_MEMORY)
            .ok_or(EngineError::MissingExport(abi::EXPORT_MEMORY))?;

        let initialize = instance.get_typed_func::<(), ()>(&mut store, abi::EXPORT_INITIALIZE);
        if let Ok(initialize) = initialize {
            initialize
                .call(&mut store, ())
                .map_err(|e| trap(abi::EXPORT_INITIALIZE, e))?;
        }

        let exports = Exports {
            malloc: export(&instance, &mut store, abi::EXPORT_MALLOC)?,
            free: export(&instance, &mut store, abi::EXPORT_FREE)?,
            init: export(&instance, &mut store, abi::EXPORT_INIT)?,
            reset: export(&instance, &mut store, abi::EXPORT_RESET)?,
            clear: export(&instance, &mut store, abi::EXPORT_CLEAR)?,
            set_memory_ptr: export(&instance, &mut store, abi::EXPORT_SET_MEMORY_PTR)?,
            compile_file: export(&instance, &mut store, abi::EXPORT_COMPILE_FILE)?,
            get_vm_code: export(&instance, &mut store, abi::EXPORT_GET_VM_CODE)?,
            translate_file: export(&instance, &mut store, abi::EXPORT_TRANSLATE_FILE)?,
            get_assembly_length: export(&instance, &mut store, abi::EXPORT_GET_ASSEMBLY_LENGTH)?,
            get_assembly: export(&instance, &mut store, abi::EXPORT_GET_ASSEMBLY)?,
            assemble: export(&instance, &mut store, abi::EXPORT_ASSEMBLE)?,
            get_machine_code: export(&instance, &mut store, abi::EXPORT_GET_MACHINE_CODE)?,
            initialize_execution: export(&instance, &mut store, abi::EXPORT_INITIALIZE_EXECUTION)?,
            execute: export(&instance, &mut store, abi::EXPORT_EXECUTE)?,
            set_key: export(&instance, &mut store, abi::EXPORT_SET_KEY)?,
        };

        tracing::debug!(
            memory_bytes = memory.data_size(&store),
            "engine module instantiated"
        );
        Ok(Self {
            store,
            memory,
            exports,
        })
    }

    /// Current size of the engine's linear memory in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    fn call<P, R>(&mut self, name: &'static str, func: TypedFunc<P, R>, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        func.call(&mut self.store, params).map_err(|e| trap(name, e))
    }

    /// Run `f` with `filename` copied into engine memory as a NUL-terminated string.
    fn with_filename<T>(
        &mut self,
        filename: &str,
        f: impl FnOnce(&mut Self, i32) -> Result<T>,
    ) -> Result<T> {
        let mut bytes = Vec::with_capacity(filename.len() + 1);
        bytes.extend_from_slice(filename.as_bytes());
        bytes.push(0);
        with_shared_buffer(self, &bytes, |engine, buf| f(engine, wasm_ptr(buf.pointer())))
    }
}

fn define_console(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(
            abi::IMPORT_MODULE,
            abi::IMPORT_LOG,
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
                let Some(memory) = caller
                    .get_export(abi::EXPORT_MEMORY)
                    .and_then(|export| export.into_memory())
                else {
                    return;
                };
                let mut bytes = vec![0u8; usize::try_from(len).unwrap_or(0)];
                if memory.read(&caller, ptr as u32 as usize, &mut bytes).is_err() {
                    tracing::warn!(ptr, len, "engine log line out of bounds");
                    return;
                }
                let line = String::from_utf8_lossy(&bytes).trim_end().to_owned();
                tracing::info!(target: abi::CONSOLE_TARGET, "{line}");
                caller.data_mut().console.push(line);
            },
        )
        .map_err(|e| EngineError::Load(e.to_string()))?;
    Ok(())
}

fn export<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &'static str,
) -> Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    if instance.get_func(&mut *store, name).is_none() {
        return Err(EngineError::MissingExport(name));
    }
    instance
        .get_typed_func::<P, R>(store, name)
        .map_err(|e| EngineError::Load(format!("export `{name}`: {e}")))
}

fn trap(call: &'static str, err: wasmtime::Error) -> EngineError {
    EngineError::Trap {
        call,
        message: err.to_string(),
    }
}

fn wasm_ptr(ptr: EnginePtr) -> i32 {
    ptr.get() as i32
}

fn wasm_len(call: &'static str, len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| EngineError::Protocol {
        call,
        message: format!("length {len} exceeds the wasm32 range"),
    })
}

impl EngineMemory for WasmEngine {
    fn alloc(&mut self, len: usize) -> hackcalc_shared::Result<EnginePtr> {
        let requested = i32::try_from(len).map_err(|_| MemoryError::OutOfMemory { len })?;
        let malloc = self.exports.malloc.clone();
        let ptr = malloc
            .call(&mut self.store, requested)
            .map_err(|e| MemoryError::Backend(format!("{}: {e}", abi::EXPORT_MALLOC)))?;
        if ptr == 0 {
            return Err(MemoryError::OutOfMemory { len });
        }
        Ok(EnginePtr::new(ptr as u32))
    }

    fn free(&mut self, ptr: EnginePtr) -> hackcalc_shared::Result<()> {
        let free = self.exports.free.clone();
        free.call(&mut self.store, wasm_ptr(ptr))
            .map_err(|e| MemoryError::Backend(format!("{}: {e}", abi::EXPORT_FREE)))
    }

    fn read(&self, ptr: EnginePtr, dst: &mut [u8]) -> hackcalc_shared::Result<()> {
        self.memory
            .read(&self.store, ptr.get() as usize, dst)
            .map_err(|_| MemoryError::OutOfBounds {
                ptr: ptr.get(),
                len: dst.len(),
                capacity: self.memory_size(),
            })
    }

    fn write(&mut self, ptr: EnginePtr, src: &[u8]) -> hackcalc_shared::Result<()> {
        let capacity = self.memory_size();
        self.memory
            .write(&mut self.store, ptr.get() as usize, src)
            .map_err(|_| MemoryError::OutOfBounds {
                ptr: ptr.get(),
                len: src.len(),
                capacity,
            })
    }
}

impl Engine for WasmEngine {
    fn init(&mut self) -> Result<()> {
        self.call(abi::EXPORT_INIT, self.exports.init.clone(), ())
    }

    fn reset(&mut self) -> Result<()> {
        self.call(abi::EXPORT_RESET, self.exports.reset.clone(), ())
    }

    fn clear(&mut self) -> Result<()> {
        self.call(abi::EXPORT_CLEAR, self.exports.clear.clone(), ())
    }

    fn set_memory_base(&mut self, base: EnginePtr) -> Result<()> {
        self.call(
            abi::EXPORT_SET_MEMORY_PTR,
            self.exports.set_memory_ptr.clone(),
            wasm_ptr(base),
        )
    }

    fn compile(&mut self, filename: &str, source: EnginePtr, len: usize) -> Result<i32> {
        let len = wasm_len(abi::EXPORT_COMPILE_FILE, len)?;
        let func = self.exports.compile_file.clone();
        self.with_filename(filename, |engine, name| {
            engine.call(abi::EXPORT_COMPILE_FILE, func, (name, wasm_ptr(source), len))
        })
    }

    fn fetch_intermediate_code(&mut self, filename: &str, dest: EnginePtr) -> Result<()> {
        let func = self.exports.get_vm_code.clone();
        self.with_filename(filename, |engine, name| {
            engine.call(abi::EXPORT_GET_VM_CODE, func, (name, wasm_ptr(dest)))
        })
    }

    fn translate(&mut self, filename: &str) -> Result<()> {
        let func = self.exports.translate_file.clone();
        self.with_filename(filename, |engine, name| {
            engine.call(abi::EXPORT_TRANSLATE_FILE, func, name)
        })
    }

    fn assembly_length(&mut self) -> Result<i32> {
        self.call(
            abi::EXPORT_GET_ASSEMBLY_LENGTH,
            self.exports.get_assembly_length.clone(),
            (),
        )
    }

    fn fetch_assembly(&mut self, dest: EnginePtr) -> Result<()> {
        self.call(abi::EXPORT_GET_ASSEMBLY, self.exports.get_assembly.clone(), wasm_ptr(dest))
    }

    fn assemble(&mut self) -> Result<()> {
        self.call(abi::EXPORT_ASSEMBLE, self.exports.assemble.clone(), ())
    }

    fn fetch_machine_code(&mut self, dest: EnginePtr, lane: usize) -> Result<()> {
        let lane = wasm_len(abi::EXPORT_GET_MACHINE_CODE, lane)?;
        self.call(
            abi::EXPORT_GET_MACHINE_CODE,
            self.exports.get_machine_code.clone(),
            (wasm_ptr(dest), lane),
        )
    }

    fn initialize_execution(&mut self) -> Result<bool> {
        let ok = self.call(
            abi::EXPORT_INITIALIZE_EXECUTION,
            self.exports.initialize_execution.clone(),
            (),
        )?;
        Ok(ok != 0)
    }

    fn execute_steps(&mut self, budget: u32) -> Result<bool> {
        let steps = i32::try_from(budget).unwrap_or(i32::MAX);
        let halted = self.call(abi::EXPORT_EXECUTE, self.exports.execute.clone(), steps)?;
        Ok(halted != 0)
    }

    fn set_key(&mut self, code: ShortWord) -> Result<()> {
        self.call(abi::EXPORT_SET_KEY, self.exports.set_key.clone(), i32::from(code))
    }

    fn take_console(&mut self) -> Vec<String> {
        std::mem::take(&mut self.store.data_mut().console)
    }
}
