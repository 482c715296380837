use hackcalc_engine::{Engine, EngineError};
use hackcalc_io::{DisplayState, KeySample};
use hackcalc_shared::MemoryWindow;
use thiserror::Error;

use crate::pipeline::{
    CompilationSession, PipelineError, PipelineOutcome, PipelineState, SourceFile, SourceReader,
};
use crate::scheduler::{RunState, Scheduler, TickReport};
use crate::{ConfigError, HostConfig};

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Front-end facing controller.
///
/// Owns the engine, the memory window, the current [`CompilationSession`] and the
/// [`Scheduler`]. The window is allocated once in [`Host::new`] and handed to the engine as its
/// RAM base; it is never freed.
pub struct Host<E> {
    engine: E,
    config: HostConfig,
    window: MemoryWindow,
    session: Option<CompilationSession>,
    scheduler: Scheduler,
}

impl<E: Engine> Host<E> {
    pub fn new(mut engine: E, config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        engine.init()?;
        let window =
            MemoryWindow::allocate(&mut engine, config.ram_cells).map_err(EngineError::from)?;
        engine.set_memory_base(window.base())?;

        let mut scheduler = Scheduler::new(&config);
        scheduler.publish_key(&mut engine, &window)?;
        tracing::debug!(base = window.base().get(), cells = config.ram_cells, "host ready");

        Ok(Self {
            engine,
            config,
            window,
            session: None,
            scheduler,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn window(&self) -> &MemoryWindow {
        &self.window
    }

    pub fn session(&self) -> Option<&CompilationSession> {
        self.session.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn run_state(&self) -> RunState {
        self.scheduler.state()
    }

    /// Replace the file set.
    ///
    /// Clears the engine's accumulated compiler state, stops execution, zeroes the window and
    /// starts a fresh session at the first file.
    pub fn load_files(&mut self, files: Vec<SourceFile>) -> Result<(), EngineError> {
        tracing::info!(files = files.len(), "loading file set");
        self.session = None;
        self.scheduler.reset();
        self.restore_window()?;
        self.engine.clear()?;
        self.session = Some(CompilationSession::new(files));
        Ok(())
    }

    /// Run the pipeline for the loaded file set.
    pub async fn compile<R>(&mut self, reader: &mut R) -> Result<PipelineOutcome, PipelineError>
    where
        R: SourceReader + ?Sized,
    {
        let session = self.session.as_mut().ok_or(PipelineError::NoActiveSession)?;
        session.run(&mut self.engine, reader, &self.config).await
    }

    /// The current session, if it reached [`PipelineState::Ready`].
    pub fn artifacts(&self) -> Option<&CompilationSession> {
        self.session
            .as_ref()
            .filter(|s| s.state() == PipelineState::Ready)
    }

    /// Start execution. Ignored unless the program is compiled and has not halted since the
    /// last reset.
    pub fn start(&mut self) -> bool {
        if self.artifacts().is_none() {
            tracing::warn!("start ignored: no compiled program");
            return false;
        }
        self.scheduler.start()
    }

    /// Change the step budget per tick. A zero budget is ignored.
    pub fn set_speed(&mut self, steps_per_tick: u32) -> bool {
        if !self.scheduler.set_speed(steps_per_tick) {
            return false;
        }
        self.config.steps_per_tick = steps_per_tick;
        true
    }

    pub fn set_input(&mut self, sample: KeySample) {
        self.scheduler.set_input(sample);
    }

    pub fn tick(&mut self) -> Result<Option<TickReport>, EngineError> {
        self.scheduler.tick(&mut self.engine, &self.window)
    }

    pub fn display(&self) -> &DisplayState {
        self.scheduler.display()
    }

    /// Restart the program: engine reset, scheduler idle, window zeroed with a blank key.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        tracing::info!("reset");
        self.engine.reset()?;
        self.scheduler.reset();
        self.restore_window()
    }

    // Zero every cell, then put a blank key back so the next tick never sees a stale one.
    fn restore_window(&mut self) -> Result<(), EngineError> {
        self.window.clear(&mut self.engine)?;
        self.scheduler.publish_key(&mut self.engine, &self.window)?;
        Ok(())
    }

    /// Console lines the engine emitted since the last call.
    pub fn take_console(&mut self) -> Vec<String> {
        self.engine.take_console()
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemorySources;
    use hackcalc_engine::testing::{EngineCall, ScriptedEngine};
    use hackcalc_io::KeyCode;

    fn host() -> Host<ScriptedEngine> {
        Host::new(ScriptedEngine::new(), HostConfig::default()).unwrap()
    }

    #[test]
    fn new_initializes_engine_and_blanks_key() {
        let host = host();
        assert_eq!(host.engine().calls()[0], EngineCall::Init);
        assert_eq!(
            host.engine().calls()[1],
            EngineCall::SetMemoryBase(host.window().base())
        );
        let key = host
            .window()
            .read_cell(host.engine(), host.config().key_cell)
            .unwrap();
        assert_eq!(key, KeyCode::Blank.value());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = HostConfig {
            num_digits: 0,
            ..HostConfig::default()
        };
        assert!(matches!(
            Host::new(ScriptedEngine::new(), config),
            Err(HostError::Config(_))
        ));
    }

    #[test]
    fn compile_without_files_is_an_error() {
        let mut host = host();
        let mut sources = InMemorySources::new();
        assert!(matches!(
            pollster::block_on(host.compile(&mut sources)),
            Err(PipelineError::NoActiveSession)
        ));
    }

    #[test]
    fn start_requires_ready_program() {
        let mut host = host();
        assert!(!host.start());
        host.load_files(InMemorySources::file_set(["Main.jack"])).unwrap();
        assert!(!host.start());
        assert_eq!(host.run_state(), RunState::Idle);
    }
}
