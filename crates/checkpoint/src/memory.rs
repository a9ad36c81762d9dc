//! In-memory checkpoint store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use confab_provider::Message;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{fresh_thread_id, CheckpointRecord, CheckpointStore, Result};

type ThreadLog = Arc<Mutex<Vec<CheckpointRecord>>>;

/// Keeps every thread in process memory; lost on exit
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, ThreadLog>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, thread_id: &str) -> ThreadLog {
        if let Some(log) = self.threads.read().get(thread_id) {
            return log.clone();
        }
        self.threads
            .write()
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Records with their timestamps
    pub fn records(&self, thread_id: &str) -> Vec<CheckpointRecord> {
        self.threads
            .read()
            .get(thread_id)
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn append(&self, thread_id: &str, messages: &[Message]) -> Result<()> {
        let log = self.log(thread_id);
        let mut log = log.lock();
        log.extend(messages.iter().cloned().map(CheckpointRecord::now));
        debug!(
            "thread {}: appended {} messages ({} total)",
            thread_id,
            messages.len(),
            log.len()
        );
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .records(thread_id)
            .into_iter()
            .map(|r| r.message)
            .collect())
    }

    async fn new_thread_id(&self) -> Result<String> {
        let mut threads = self.threads.write();
        loop {
            let id = fresh_thread_id();
            if !threads.contains_key(&id) {
                threads.insert(id.clone(), ThreadLog::default());
                return Ok(id);
            }
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.threads.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
