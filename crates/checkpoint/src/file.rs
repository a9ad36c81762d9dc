//! JSON-lines checkpoint store
//!
//! Layout: `<dir>/<thread_id>.jsonl`, one [`CheckpointRecord`] per line.
//! Lines are only ever appended; each append writes whole lines and syncs
//! before returning.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use confab_provider::Message;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::lock::ThreadLocks;
use crate::{
    fresh_thread_id, validate_thread_id, CheckpointRecord, CheckpointStore, Result,
};

const EXTENSION: &str = "jsonl";

pub struct FileCheckpointStore {
    dir: PathBuf,
    writers: ThreadLocks,
}

impl FileCheckpointStore {
    /// Open a store rooted at `dir`, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!("checkpoint directory: {:?}", dir);
        Ok(Self {
            dir,
            writers: ThreadLocks::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", thread_id, EXTENSION))
    }

    /// Threads with an append in progress or queued
    pub fn busy_threads(&self) -> usize {
        self.writers.len()
    }

    /// Records with their timestamps
    pub async fn records(&self, thread_id: &str) -> Result<Vec<CheckpointRecord>> {
        validate_thread_id(thread_id)?;
        let path = self.thread_path(thread_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let complete = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut records = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => records.push(record),
                // interrupted write
                Err(e) if i + 1 == lines.len() && !complete => {
                    warn!(
                        "thread {}: ignoring incomplete trailing record: {}",
                        thread_id, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }
}

/// Cut an interrupted final record so the next one starts on its own line.
/// Returns the length of the file afterwards.
async fn drop_torn_tail(file: &mut File, thread_id: &str) -> Result<u64> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0)).await?;
    file.read_to_end(&mut content).await?;
    let keep = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i as u64 + 1);
    warn!(
        "thread {}: discarding {} bytes of an incomplete record before appending",
        thread_id,
        len - keep
    );
    file.set_len(keep).await?;
    Ok(keep)
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn append(&self, thread_id: &str, messages: &[Message]) -> Result<()> {
        validate_thread_id(thread_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for message in messages {
            serde_json::to_writer(&mut buf, &CheckpointRecord::now(message.clone()))?;
            buf.push(b'\n');
        }

        let _lease = self.writers.acquire(thread_id).await;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.thread_path(thread_id))
            .await?;
        let end = drop_torn_tail(&mut file, thread_id).await?;
        file.seek(SeekFrom::Start(end)).await?;
        file.write_all(&buf).await?;
        file.sync_data().await?;

        debug!("thread {}: appended {} messages", thread_id, messages.len());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .records(thread_id)
            .await?
            .into_iter()
            .map(|r| r.message)
            .collect())
    }

    async fn new_thread_id(&self) -> Result<String> {
        loop {
            let id = fresh_thread_id();
            let created = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.thread_path(&id))
                .await;
            match created {
                Ok(_) => return Ok(id),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
