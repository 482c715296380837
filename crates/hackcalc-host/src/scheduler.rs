use hackcalc_engine::{Engine, EngineError};
use hackcalc_io::{DisplayDecoder, DisplayState, KeyCode, KeySample, Keypad};
use hackcalc_shared::MemoryWindow;

use crate::HostConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started since the last load or reset. Ticks do nothing.
    Idle,
    Running,
    /// The engine reported a halt. Ticks keep refreshing the display and key cell but never
    /// execute again until reset.
    Halted,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Engine steps were executed this tick.
    pub executed: bool,
    /// The engine halted during this tick.
    pub halted: bool,
    pub key: KeyCode,
    pub display: DisplayState,
}

/// Per-tick execution loop.
///
/// Each running tick executes `steps_per_tick` engine steps, then decodes the display and
/// publishes the current key code. Key publication happens on every non-idle tick, including
/// when no key is held, so the engine never sees a key from an earlier tick.
#[derive(Debug)]
pub struct Scheduler {
    state: RunState,
    steps_per_tick: u32,
    decoder: DisplayDecoder,
    keypad: Keypad,
    display: DisplayState,
    ticks: u64,
}

impl Scheduler {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            state: RunState::Idle,
            steps_per_tick: config.steps_per_tick,
            decoder: DisplayDecoder::new(config.display_base, config.num_digits),
            keypad: Keypad::new(config.key_cell),
            display: DisplayState::blank(config.num_digits),
            ticks: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn steps_per_tick(&self) -> u32 {
        self.steps_per_tick
    }

    /// Change the step budget. Takes effect on the next tick; zero is rejected.
    pub fn set_speed(&mut self, steps_per_tick: u32) -> bool {
        if steps_per_tick == 0 {
            tracing::warn!("speed change ignored: step budget must be positive");
            return false;
        }
        tracing::debug!(steps_per_tick, "speed changed");
        self.steps_per_tick = steps_per_tick;
        true
    }

    /// Most recently decoded display.
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Ticks that executed engine steps since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// Latch the input sample used by the next key publication.
    pub fn set_input(&mut self, sample: KeySample) {
        self.keypad.set_sample(sample);
    }

    /// Begin executing. Only valid from [`RunState::Idle`]; returns whether the request was
    /// honoured.
    pub fn start(&mut self) -> bool {
        match self.state {
            RunState::Idle => {
                tracing::info!(steps_per_tick = self.steps_per_tick, "execution started");
                self.state = RunState::Running;
                true
            }
            state => {
                tracing::warn!(?state, "start ignored");
                false
            }
        }
    }

    /// Return to [`RunState::Idle`] and forget the last decoded display and input.
    pub fn reset(&mut self) {
        self.state = RunState::Idle;
        self.ticks = 0;
        self.keypad.release_all();
        self.display = DisplayState::blank(self.decoder.num_digits());
    }

    /// Write the current key code without running a tick.
    pub fn publish_key<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        window: &MemoryWindow,
    ) -> Result<KeyCode, EngineError> {
        Ok(self.keypad.publish(window, engine)?)
    }

    /// Run one tick. Returns `None` when idle.
    pub fn tick<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        window: &MemoryWindow,
    ) -> Result<Option<TickReport>, EngineError> {
        let mut executed = false;
        let mut halted = false;
        match self.state {
            RunState::Idle => return Ok(None),
            RunState::Running => {
                executed = true;
                self.ticks += 1;
                if engine.execute_steps(self.steps_per_tick)? {
                    tracing::info!(ticks = self.ticks, "program halted");
                    self.state = RunState::Halted;
                    halted = true;
                }
            }
            RunState::Halted => {}
        }

        self.display = self.decoder.read_digits(window, &*engine)?;
        let key = self.keypad.publish(window, engine)?;
        Ok(Some(TickReport {
            executed,
            halted,
            key,
            display: self.display.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackcalc_engine::testing::{EngineCall, ScriptedEngine};
    use hackcalc_shared::layout::{DISPLAY_BASE, RAM_CELLS};

    fn setup(engine: &mut ScriptedEngine) -> (Scheduler, MemoryWindow) {
        let window = MemoryWindow::allocate(engine, RAM_CELLS).unwrap();
        engine.set_memory_base(window.base()).unwrap();
        (Scheduler::new(&HostConfig::default()), window)
    }

    #[test]
    fn idle_ticks_touch_nothing() {
        let mut engine = ScriptedEngine::new();
        let (mut sched, window) = setup(&mut engine);
        let calls = engine.calls().len();
        assert_eq!(sched.tick(&mut engine, &window).unwrap(), None);
        assert_eq!(engine.calls().len(), calls);
    }

    #[test]
    fn running_tick_executes_then_reads_then_publishes() {
        let mut engine = ScriptedEngine::new();
        let (mut sched, window) = setup(&mut engine);
        let config = HostConfig::default();
        assert!(sched.set_speed(250));
        assert!(sched.start());
        sched.set_input(KeySample::char('6'));

        let report = sched.tick(&mut engine, &window).unwrap().unwrap();
        assert!(report.executed);
        assert!(!report.halted);
        assert_eq!(report.key, KeyCode::Digit6);
        assert_eq!(engine.calls().last(), Some(&EngineCall::Execute(250)));
        assert_eq!(window.read_cell(&engine, config.key_cell).unwrap(), 6);

        // The key published at the end of tick 1 is seen by the engine during tick 2.
        let report = sched.tick(&mut engine, &window).unwrap().unwrap();
        assert_eq!(window.read_cell(&engine, DISPLAY_BASE).unwrap(), 7);
        assert_eq!(report.display[config.num_digits - 1].code(), 7);
    }

    #[test]
    fn start_is_ignored_unless_idle() {
        let mut engine = ScriptedEngine::new().halt_after(1);
        let (mut sched, window) = setup(&mut engine);
        assert!(sched.start());
        assert!(!sched.start());
        sched.tick(&mut engine, &window).unwrap();
        assert_eq!(sched.state(), RunState::Halted);
        assert!(!sched.start());
        sched.reset();
        assert!(sched.start());
    }
}
