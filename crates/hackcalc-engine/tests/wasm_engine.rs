#![cfg(all(feature = "wasmtime", not(target_arch = "wasm32")))]

use hackcalc_engine::{Engine, EngineError, WasmEngine};
use hackcalc_shared::layout::{DISPLAY_BASE, KEY_CELL, RAM_CELLS, ROM_WORDS};
use hackcalc_shared::{with_shared_buffer, with_zeroed_buffer, MemoryWindow};

/// Minimal engine module: compiled "intermediate code" is the source text itself, translation
/// appends it to the assembly, every machine-code lane is filled with `lane + 1`, and execution
/// copies the key cell into the first display cell and halts after 100 steps.
const ECHO_ENGINE: &str = r#"
(module
  (import "env" "log" (func $log (param i32 i32)))
  (memory (export "memory") 8)
  (global $heap (mut i32) (i32.const 1024))
  (global $ram (mut i32) (i32.const 0))
  (global $vm_len (mut i32) (i32.const 0))
  (global $asm_len (mut i32) (i32.const 0))
  (global $steps (mut i32) (i32.const 0))
  (data (i32.const 16) "compiled")

  (func (export "malloc") (param $n i32) (result i32)
    (local $p i32)
    (local.set $p (global.get $heap))
    (global.set $heap
      (i32.add (global.get $heap)
        (i32.add (i32.and (i32.add (local.get $n) (i32.const 7)) (i32.const -8)) (i32.const 8))))
    (local.get $p))
  (func (export "free") (param i32))

  (func (export "Init"))
  (func (export "Reset") (global.set $steps (i32.const 0)))
  (func (export "Clear")
    (global.set $vm_len (i32.const 0))
    (global.set $asm_len (i32.const 0))
    (global.set $steps (i32.const 0)))
  (func (export "SetMemoryPtr") (param i32) (global.set $ram (local.get 0)))

  (func (export "CompileFile") (param $name i32) (param $src i32) (param $len i32) (result i32)
    (if (i32.gt_s (local.get $len) (i32.const 0))
      (then
        (if (i32.eq (i32.load8_u (local.get $src)) (i32.const 33))
          (then (return (i32.const -1))))))
    (memory.copy (i32.const 0x60000) (local.get $src) (local.get $len))
    (global.set $vm_len (local.get $len))
    (call $log (i32.const 16) (i32.const 8))
    (local.get $len))
  (func (export "GetVmCodeString") (param $name i32) (param $dest i32)
    (memory.copy (local.get $dest) (i32.const 0x60000) (global.get $vm_len)))
  (func (export "TranslateFile") (param $name i32)
    (memory.copy
      (i32.add (i32.const 0x70000) (global.get $asm_len))
      (i32.const 0x60000)
      (global.get $vm_len))
    (global.set $asm_len (i32.add (global.get $asm_len) (global.get $vm_len))))
  (func (export "GetAssemblyLength") (result i32) (global.get $asm_len))
  (func (export "GetAssembly") (param $dest i32)
    (memory.copy (local.get $dest) (i32.const 0x70000) (global.get $asm_len)))
  (func (export "Assemble"))
  (func (export "GetMachineCode") (param $dest i32) (param $lane i32)
    (memory.fill (local.get $dest) (i32.add (local.get $lane) (i32.const 1)) (i32.const 32768)))

  (func (export "InitializeExecution") (result i32) (i32.const 1))
  (func (export "Execute") (param $n i32) (result i32)
    (global.set $steps (i32.add (global.get $steps) (local.get $n)))
    (i32.store16
      (i32.add (global.get $ram) (i32.const 32768))
      (i32.load16_s (i32.add (global.get $ram) (i32.const 32794))))
    (i32.ge_s (global.get $steps) (i32.const 100)))
  (func (export "SetKey") (param $k i32)
    (i32.store16 (i32.add (global.get $ram) (i32.const 32794)) (local.get $k)))
)
"#;

fn load() -> WasmEngine {
    let mut engine = WasmEngine::from_bytes(ECHO_ENGINE.as_bytes()).unwrap();
    engine.init().unwrap();
    engine
}

fn compile(engine: &mut WasmEngine, name: &str, source: &[u8]) -> i32 {
    with_shared_buffer(engine, source, |engine, buf| {
        engine.compile(name, buf.pointer(), buf.len())
    })
    .unwrap()
}

#[test]
fn compile_and_fetch_intermediate_code() {
    let mut engine = load();
    let len = compile(&mut engine, "Main.jack", b"class Main {}");
    assert_eq!(len, 13);

    let code = with_zeroed_buffer(&mut engine, len as usize, |engine, buf| {
        engine.fetch_intermediate_code("Main.jack", buf.pointer())?;
        Ok::<_, EngineError>(buf.read_text(&*engine)?)
    })
    .unwrap();
    assert_eq!(code, "class Main {}");
    assert_eq!(engine.take_console(), vec!["compiled".to_owned()]);
    assert!(engine.take_console().is_empty());
}

#[test]
fn rejected_source_returns_negative_length() {
    let mut engine = load();
    assert!(compile(&mut engine, "Bad.jack", b"!oops") < 0);
    assert!(engine.take_console().is_empty());
}

#[test]
fn translate_accumulates_assembly() {
    let mut engine = load();
    compile(&mut engine, "A.jack", b"aaa");
    engine.translate("A.jack").unwrap();
    compile(&mut engine, "B.jack", b"bb");
    engine.translate("B.jack").unwrap();

    let len = engine.assembly_length().unwrap();
    assert_eq!(len, 5);
    let asm = with_zeroed_buffer(&mut engine, len as usize, |engine, buf| {
        engine.fetch_assembly(buf.pointer())?;
        Ok::<_, EngineError>(buf.read_text(&*engine)?)
    })
    .unwrap();
    assert_eq!(asm, "aaabb");

    engine.clear().unwrap();
    assert_eq!(engine.assembly_length().unwrap(), 0);
}

#[test]
fn machine_code_lanes_fill_rom_sized_buffers() {
    let mut engine = load();
    engine.assemble().unwrap();
    for lane in 0..2 {
        let bytes = with_zeroed_buffer(&mut engine, ROM_WORDS, |engine, buf| {
            engine.fetch_machine_code(buf.pointer(), lane)?;
            Ok::<_, EngineError>(buf.read_bytes(&*engine)?)
        })
        .unwrap();
        assert_eq!(bytes.len(), ROM_WORDS);
        assert!(bytes.iter().all(|b| usize::from(*b) == lane + 1));
    }
}

#[test]
fn execution_sees_window_and_reports_halt() {
    let mut engine = load();
    let window = MemoryWindow::allocate(&mut engine, RAM_CELLS).unwrap();
    engine.set_memory_base(window.base()).unwrap();
    assert!(engine.initialize_execution().unwrap());

    engine.set_key(7).unwrap();
    assert_eq!(window.read_cell(&engine, KEY_CELL).unwrap(), 7);
    assert!(!engine.execute_steps(60).unwrap());
    assert_eq!(window.read_cell(&engine, DISPLAY_BASE).unwrap(), 7);

    // Host-side key publication goes through the same cell.
    window.write_cell(&mut engine, KEY_CELL, 3).unwrap();
    assert!(engine.execute_steps(60).unwrap());
    assert_eq!(window.read_cell(&engine, DISPLAY_BASE).unwrap(), 3);

    engine.reset().unwrap();
    assert!(!engine.execute_steps(1).unwrap());
}

#[test]
fn missing_exports_are_reported_by_name() {
    let err = WasmEngine::from_bytes(br#"(module (memory (export "memory") 1))"#)
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::MissingExport("malloc")), "{err}");

    let err = WasmEngine::from_bytes(b"(module)").err().unwrap();
    assert!(matches!(err, EngineError::MissingExport("memory")), "{err}");
}

#[test]
fn invalid_module_fails_to_load() {
    assert!(matches!(
        WasmEngine::from_bytes(b"not wasm"),
        Err(EngineError::Load(_))
    ));
}
