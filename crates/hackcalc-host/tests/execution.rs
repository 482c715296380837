#![cfg(not(target_arch = "wasm32"))]

use hackcalc_engine::testing::{EngineCall, ScriptedEngine};
use hackcalc_host::{Host, HostConfig, InMemorySources, PipelineOutcome, RunState};
use hackcalc_io::{KeyCode, KeySample};
use hackcalc_shared::layout::DISPLAY_BASE;

fn compiled_host(engine: ScriptedEngine) -> Host<ScriptedEngine> {
    let mut host = Host::new(engine, HostConfig::default()).unwrap();
    let mut sources = InMemorySources::new();
    sources.insert("Main.jack", "function Main.main 0");
    host.load_files(InMemorySources::file_set(["Main.jack"]))
        .unwrap();
    assert_eq!(
        pollster::block_on(host.compile(&mut sources)).unwrap(),
        PipelineOutcome::Ready
    );
    host
}

fn executes(host: &Host<ScriptedEngine>) -> usize {
    host.engine()
        .count_calls(|c| matches!(c, EngineCall::Execute(_)))
}

#[test]
fn halted_program_is_never_executed_again() {
    let mut host = compiled_host(ScriptedEngine::new().halt_after(3000));
    host.set_input(KeySample::char('2'));
    assert!(host.start());

    let mut halted_on = None;
    for tick in 0..10 {
        let report = host.tick().unwrap().unwrap();
        if report.halted {
            halted_on = Some(tick);
            break;
        }
    }
    assert_eq!(halted_on, Some(2));
    assert_eq!(host.run_state(), RunState::Halted);
    assert_eq!(executes(&host), 3);
    let display = host.display().clone();

    // Later ticks still decode the display and publish keys, but never execute.
    host.set_input(KeySample::char('9'));
    for _ in 0..5 {
        let report = host.tick().unwrap().unwrap();
        assert!(!report.executed);
        assert!(!report.halted);
        assert_eq!(report.display, display);
        assert_eq!(report.key, KeyCode::Digit9);
    }
    assert_eq!(executes(&host), 3);
    let key_cell = host.config().key_cell;
    assert_eq!(host.window().read_cell(host.engine(), key_cell).unwrap(), 9);

    // A halted program cannot be restarted without a reset.
    assert!(!host.start());
}

#[test]
fn reset_makes_program_startable_again() {
    let mut host = compiled_host(ScriptedEngine::new().halt_after(1000));
    host.set_input(KeySample::char('5'));
    assert!(host.start());
    assert!(host.tick().unwrap().unwrap().halted);

    host.reset().unwrap();
    assert_eq!(host.run_state(), RunState::Idle);
    assert!(host.display().digits().iter().all(|d| d.code() == 0));
    assert_eq!(host.tick().unwrap(), None);
    let key_cell = host.config().key_cell;
    assert_eq!(
        host.window().read_cell(host.engine(), key_cell).unwrap(),
        KeyCode::Blank.value()
    );
    assert!(host.engine().calls().contains(&EngineCall::Reset));

    assert!(host.start());
    assert!(host.tick().unwrap().unwrap().executed);
}

#[test]
fn speed_change_applies_to_next_tick() {
    let mut host = compiled_host(ScriptedEngine::new());
    assert!(host.start());
    host.tick().unwrap();
    assert!(host.set_speed(42));
    assert!(!host.set_speed(0));
    assert_eq!(host.config().steps_per_tick, 42);
    host.tick().unwrap();
    let budgets: Vec<u32> = host
        .engine()
        .calls()
        .iter()
        .filter_map(|c| match c {
            EngineCall::Execute(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(budgets, vec![1000, 42]);
}

#[test]
fn loading_new_files_clears_engine_and_stops_execution() {
    let mut host = compiled_host(ScriptedEngine::new());
    assert!(host.start());
    host.tick().unwrap();

    host.load_files(InMemorySources::file_set(["Other.jack"]))
        .unwrap();
    assert_eq!(host.run_state(), RunState::Idle);
    assert!(host.artifacts().is_none());
    assert_eq!(
        host.engine()
            .count_calls(|c| *c == EngineCall::Clear),
        2
    );
    assert!(!host.start());
}

#[test]
fn loading_new_files_publishes_blank_key_before_next_program() {
    let mut host = compiled_host(ScriptedEngine::new());
    host.set_input(KeySample::char('5'));
    assert!(host.start());
    host.tick().unwrap();
    let key_cell = host.config().key_cell;
    assert_eq!(host.window().read_cell(host.engine(), key_cell).unwrap(), 5);

    host.set_input(KeySample::NONE);
    host.load_files(InMemorySources::file_set(["Other.jack"]))
        .unwrap();
    assert_eq!(
        host.window().read_cell(host.engine(), key_cell).unwrap(),
        KeyCode::Blank.value()
    );
    assert_eq!(host.window().read_cell(host.engine(), DISPLAY_BASE).unwrap(), 0);

    let mut sources = InMemorySources::new();
    sources.insert("Other.jack", "function Other.main 0");
    assert_eq!(
        pollster::block_on(host.compile(&mut sources)).unwrap(),
        PipelineOutcome::Ready
    );
    assert!(host.start());
    let report = host.tick().unwrap().unwrap();
    assert!(report.executed);
    assert_eq!(report.key, KeyCode::Blank);
    // The scripted engine echoes a held key into the display; a stale '5' would show as 6.
    assert_eq!(host.window().read_cell(host.engine(), DISPLAY_BASE).unwrap(), 0);
}

#[test]
fn console_lines_are_drained() {
    let mut host = compiled_host(ScriptedEngine::new());
    let console = host.take_console();
    assert_eq!(
        console,
        vec![
            "Compiled Main.jack".to_owned(),
            "Translated Main.jack".to_owned(),
            "Assembled program".to_owned(),
        ]
    );
    assert!(host.take_console().is_empty());
}
