//! Error types for elastomer
//!
//! Staging, posting, observing and retiring never fail from the caller's
//! point of view. Errors only surface from construction, slot definition
//! and the awaitable helpers.

use crate::config::ConfigError;
use thiserror::Error;

/// Top-level archive error
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A slot name was already defined with a different payload type
    #[error("slot `{name}` is defined as {existing}, cannot redefine it as {requested}")]
    SlotTypeConflict {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// The sequencer thread is gone; no further units will run
    #[error("sequencer has stopped")]
    SequencerClosed,

    /// The sequencer thread could not be started
    #[error("failed to start sequencer thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// No tokio runtime to host timers and delivery tasks
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;
