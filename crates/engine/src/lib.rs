//! Conversation engine
//!
//! Drives one request/response cycle per thread: the model is called with
//! the thread history, any tools it asks for are run through the catalog,
//! and the loop repeats until the model answers without tools or the
//! round-trip cap is reached.

use confab_checkpoint::CheckpointError;
use confab_provider::ProviderError;
use thiserror::Error;

pub mod engine;
pub mod prompt;
pub mod state;

pub use engine::{ConversationEngine, EngineConfig, DEFAULT_MAX_ROUND_TRIPS, INTERRUPTED_RESULT};
pub use prompt::SystemPrompt;
pub use state::{next_state, TurnState};

/// Errors surfaced by `submit`
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model call failed: {0}")]
    ModelCall(#[from] ProviderError),

    #[error("turn stopped after {limit} model round trips")]
    TurnLimitExceeded { limit: usize },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("turn cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EngineError>;
