use hackcalc_shared::MemoryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The engine aborted while servicing a call.
    #[error("engine trapped in {call}: {message}")]
    Trap { call: &'static str, message: String },

    #[error("engine module does not export `{0}`")]
    MissingExport(&'static str),

    /// The engine module could not be compiled, linked, or instantiated.
    #[error("failed to load engine module: {0}")]
    Load(String),

    /// The engine returned a value outside its documented range.
    #[error("engine protocol violation in {call}: {message}")]
    Protocol { call: &'static str, message: String },
}
