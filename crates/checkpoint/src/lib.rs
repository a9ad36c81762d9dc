//! Conversation checkpoints
//!
//! Every thread is an append-only log of [`Message`]s. The engine appends
//! each completed step before moving on, so whatever a store returns from
//! [`CheckpointStore::load`] is a consistent prefix of the conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confab_provider::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file;
pub mod lock;
pub mod memory;

pub use file::FileCheckpointStore;
pub use lock::{ThreadLease, ThreadLocks};
pub use memory::MemoryCheckpointStore;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid thread id '{0}'")]
    InvalidThreadId(String),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// One persisted log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub recorded_at: DateTime<Utc>,
    pub message: Message,
}

impl CheckpointRecord {
    pub fn now(message: Message) -> Self {
        Self {
            recorded_at: Utc::now(),
            message,
        }
    }
}

/// Per-thread message log
///
/// Appends to one thread are serialized; distinct threads never see each
/// other's messages.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append `messages` to the end of the thread, in order
    async fn append(&self, thread_id: &str, messages: &[Message]) -> Result<()>;

    /// Full history; empty for a thread that was never written
    async fn load(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// A thread id no earlier call has returned
    async fn new_thread_id(&self) -> Result<String>;

    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Reject ids that could not safely name a file
pub fn validate_thread_id(thread_id: &str) -> Result<()> {
    let bad = thread_id.is_empty()
        || thread_id == "."
        || thread_id.contains("..")
        || thread_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(CheckpointError::InvalidThreadId(thread_id.to_string()));
    }
    Ok(())
}

pub(crate) fn fresh_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_thread_id() {
        assert!(validate_thread_id("0b7c3f52-1c1e-4a38-9d65-1f0b6f1e2a10").is_ok());
        assert!(validate_thread_id("cli:default").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "../x", "a\0b", "tab\there"] {
            assert!(
                matches!(validate_thread_id(bad), Err(CheckpointError::InvalidThreadId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_record_serializes_tagged_message() {
        let record = CheckpointRecord::now(Message::user("hi"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["message"]["role"], "user");
        assert!(json["recorded_at"].is_string());
    }
}
