//! Sequential multi-file compilation.
//!
//! ```text
//!   Reading(0) ─► Reading(1) ─► … ─► Assembling ─► Ready
//!        │             │
//!        └──── compile rejected / engine failure ────► Aborted (sticky)
//! ```
//!
//! Each file's compile and translate output occupies single-slot engine state, so file `i + 1`
//! is never handed to the engine before every call for file `i` has returned.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use hackcalc_engine::{Engine, EngineError};
use hackcalc_shared::{with_shared_buffer, with_zeroed_buffer};
use thiserror::Error;

use crate::HostConfig;

const ABORTED: isize = -1;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading a source file failed before it reached the engine. The session does not advance
    /// and the read can be retried.
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },

    /// An engine call failed. The session is aborted.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no file set has been loaded")]
    NoActiveSession,

    #[error("pipeline operation not valid in state {0:?}")]
    OutOfSequence(PipelineState),

    #[error("engine refused to initialize execution")]
    ExecutionRefused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Waiting for file `i` to be compiled.
    Reading(usize),
    /// Every file compiled; assembly and machine-code extraction pending.
    Assembling,
    Aborted,
    Ready,
}

/// Result of handing one file to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Compiled and translated; `vm_len` bytes of intermediate code were produced.
    Compiled { vm_len: usize },
    /// The engine rejected the file. The session is now aborted.
    Rejected,
}

/// How a complete pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Ready,
    Rejected { file: String },
}

/// One source file of a file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    path: PathBuf,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Name the file by the last component of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }

    /// Name the engine knows the file by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Asynchronous source of file contents.
pub trait SourceReader {
    fn read(&mut self, file: &SourceFile) -> impl Future<Output = io::Result<Vec<u8>>>;
}

/// Reads sources from the local filesystem.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceReader;

#[cfg(not(target_arch = "wasm32"))]
impl SourceReader for FsSourceReader {
    async fn read(&mut self, file: &SourceFile) -> io::Result<Vec<u8>> {
        tokio::fs::read(file.path()).await
    }
}

/// Sources already held in memory, keyed by file name (e.g. handed over by a front-end).
#[derive(Debug, Default, Clone)]
pub struct InMemorySources {
    files: BTreeMap<String, Vec<u8>>,
}

impl InMemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }

    /// File set in insertion order of `names`.
    pub fn file_set<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<SourceFile> {
        names
            .into_iter()
            .map(|name| SourceFile::new(name, name))
            .collect()
    }
}

impl SourceReader for InMemorySources {
    async fn read(&mut self, file: &SourceFile) -> io::Result<Vec<u8>> {
        self.files.get(file.name()).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not loaded", file.name()))
        })
    }
}

/// Artifact name of a source file's intermediate code: `Main.jack` becomes `Main.vm`.
pub fn artifact_name(source_name: &str) -> String {
    let stem = source_name.strip_suffix(".jack").unwrap_or(source_name);
    format!("{stem}.vm")
}

/// Pipeline state for one file set.
#[derive(Debug)]
pub struct CompilationSession {
    files: Vec<SourceFile>,
    cursor: isize,
    ready: bool,
    vm_code: BTreeMap<String, String>,
    assembly: Option<String>,
    machine_code: Vec<Vec<u8>>,
    rejected: Option<String>,
}

impl CompilationSession {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            cursor: 0,
            ready: false,
            vm_code: BTreeMap::new(),
            assembly: None,
            machine_code: Vec::new(),
            rejected: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.cursor == ABORTED {
            PipelineState::Aborted
        } else if self.ready {
            PipelineState::Ready
        } else if (self.cursor as usize) < self.files.len() {
            PipelineState::Reading(self.cursor as usize)
        } else {
            PipelineState::Assembling
        }
    }

    /// Position of the next file to compile, or -1 once aborted.
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// The file waiting to be compiled, if any.
    pub fn current_file(&self) -> Option<&SourceFile> {
        match self.state() {
            PipelineState::Reading(i) => self.files.get(i),
            _ => None,
        }
    }

    /// Name of the file the engine rejected, if the session aborted on one.
    pub fn rejected_file(&self) -> Option<&str> {
        self.rejected.as_deref()
    }

    /// Intermediate code by source file name.
    pub fn vm_code(&self) -> &BTreeMap<String, String> {
        &self.vm_code
    }

    /// Intermediate code keyed by artifact name, in file order.
    pub fn vm_artifacts(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.files.iter().filter_map(|file| {
            self.vm_code
                .get(file.name())
                .map(|code| (artifact_name(file.name()), code.as_str()))
        })
    }

    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    /// One byte stream per word lane; stream `i` holds byte `i` of every ROM word.
    pub fn machine_code(&self) -> &[Vec<u8>] {
        &self.machine_code
    }

    /// Machine-code streams named `0.hack`, `1.hack`, ….
    pub fn machine_code_artifacts(&self) -> impl Iterator<Item = (String, &[u8])> + '_ {
        self.machine_code
            .iter()
            .enumerate()
            .map(|(i, stream)| (format!("{i}.hack"), stream.as_slice()))
    }

    fn abort(&mut self) {
        self.cursor = ABORTED;
    }

    /// Hand the current file's contents to the engine.
    ///
    /// On success the intermediate code is kept, the file is translated and the cursor advances.
    /// A negative compile length aborts the session without further engine calls.
    pub fn submit_file<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        source: &[u8],
    ) -> Result<FileOutcome, PipelineError> {
        let name = match self.current_file() {
            Some(file) => file.name().to_owned(),
            None => return Err(PipelineError::OutOfSequence(self.state())),
        };

        match compile_file(engine, &name, source) {
            Ok(Some(code)) => {
                let vm_len = code.len();
                tracing::info!(file = %name, vm_len, "compiled");
                self.vm_code.insert(name, code);
                self.cursor += 1;
                Ok(FileOutcome::Compiled { vm_len })
            }
            Ok(None) => {
                tracing::warn!(file = %name, "engine rejected file; aborting session");
                self.rejected = Some(name);
                self.abort();
                Ok(FileOutcome::Rejected)
            }
            Err(err) => {
                tracing::error!(file = %name, error = %err, "engine failure; aborting session");
                self.abort();
                Err(err.into())
            }
        }
    }

    /// Assemble every translated file and extract the machine-code streams.
    ///
    /// Runs exactly once per session; on success execution has been initialized and the session
    /// is [`PipelineState::Ready`].
    pub fn assemble<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        config: &HostConfig,
    ) -> Result<(), PipelineError> {
        if self.state() != PipelineState::Assembling {
            return Err(PipelineError::OutOfSequence(self.state()));
        }

        let (assembly, machine_code) =
            match assemble_program(engine, config.rom_words, config.machine_code_streams) {
                Ok(out) => out,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        "engine failure during assembly; aborting session"
                    );
                    self.abort();
                    return Err(err.into());
                }
            };
        tracing::info!(
            assembly_len = assembly.len(),
            streams = machine_code.len(),
            "assembled program"
        );
        self.assembly = Some(assembly);
        self.machine_code = machine_code;

        match engine.initialize_execution() {
            Ok(true) => {}
            Ok(false) => {
                self.abort();
                return Err(PipelineError::ExecutionRefused);
            }
            Err(err) => {
                self.abort();
                return Err(err.into());
            }
        }
        self.ready = true;
        Ok(())
    }

    /// Drive the session to completion, reading each file through `reader` before handing it to
    /// the engine.
    ///
    /// An I/O failure leaves the session at the failing file so `run` can be called again.
    pub async fn run<E, R>(
        &mut self,
        engine: &mut E,
        reader: &mut R,
        config: &HostConfig,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        E: Engine + ?Sized,
        R: SourceReader + ?Sized,
    {
        while let Some(file) = self.current_file().cloned() {
            let source = reader.read(&file).await.map_err(|source| {
                tracing::warn!(file = file.name(), error = %source, "source read failed");
                PipelineError::Io {
                    file: file.name().to_owned(),
                    source,
                }
            })?;
            if self.submit_file(engine, &source)? == FileOutcome::Rejected {
                return Ok(PipelineOutcome::Rejected {
                    file: file.name().to_owned(),
                });
            }
        }

        match self.state() {
            PipelineState::Assembling => {
                self.assemble(engine, config)?;
                Ok(PipelineOutcome::Ready)
            }
            PipelineState::Ready => Ok(PipelineOutcome::Ready),
            PipelineState::Aborted => match &self.rejected {
                Some(file) => Ok(PipelineOutcome::Rejected { file: file.clone() }),
                None => Err(PipelineError::OutOfSequence(PipelineState::Aborted)),
            },
            state @ PipelineState::Reading(_) => Err(PipelineError::OutOfSequence(state)),
        }
    }
}

/// Compile one file and fetch its intermediate code. `None` means the engine rejected it.
fn compile_file<E: Engine + ?Sized>(
    engine: &mut E,
    name: &str,
    source: &[u8],
) -> Result<Option<String>, EngineError> {
    let vm_len = with_shared_buffer(engine, source, |engine, buf| {
        engine.compile(name, buf.pointer(), buf.len())
    })?;
    let Ok(vm_len) = usize::try_from(vm_len) else {
        return Ok(None);
    };

    let code = with_zeroed_buffer(engine, vm_len, |engine, buf| {
        engine.fetch_intermediate_code(name, buf.pointer())?;
        Ok::<_, EngineError>(buf.read_text(&*engine)?)
    })?;
    engine.translate(name)?;
    tracing::debug!(file = name, "translated");
    Ok(Some(code))
}

fn assemble_program<E: Engine + ?Sized>(
    engine: &mut E,
    rom_words: usize,
    streams: usize,
) -> Result<(String, Vec<Vec<u8>>), EngineError> {
    let len = engine.assembly_length()?;
    let len = usize::try_from(len).map_err(|_| EngineError::Protocol {
        call: "assembly_length",
        message: format!("negative assembly length {len}"),
    })?;
    let assembly = with_zeroed_buffer(engine, len, |engine, buf| {
        engine.fetch_assembly(buf.pointer())?;
        Ok::<_, EngineError>(buf.read_text(&*engine)?)
    })?;

    engine.assemble()?;

    // One ROM-sized buffer is reused for every lane; the engine overwrites all of it each time.
    let machine_code = with_zeroed_buffer(engine, rom_words, |engine, buf| {
        (0..streams)
            .map(|lane| {
                engine.fetch_machine_code(buf.pointer(), lane)?;
                Ok::<_, EngineError>(buf.read_bytes(&*engine)?)
            })
            .collect::<Result<Vec<_>, _>>()
    })?;
    Ok((assembly, machine_code))
}
