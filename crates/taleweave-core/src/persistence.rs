//! Persistence gateway
//!
//! Stores finished artifacts in a durable document sink with a bounded,
//! fixed-delay retry. There is no queue behind it: once the attempts run
//! out the artifact is dropped and only a log line remains.

use crate::error::PersistError;
use crate::registry::Room;
use crate::types::{Phase, RoomId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Document written for a finished room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Room that produced the artifact
    pub room: RoomId,
    /// Final artifact text
    pub text: String,
    /// Seats in the room
    pub capacity: u32,
    /// Accepted submissions
    pub turns: u64,
    /// Phase the room had reached
    pub phase: Phase,
    /// Teardown time
    pub completed_at: DateTime<Utc>,
    /// blake3 digest of `text`, hex encoded
    pub digest: String,
}

impl ArtifactRecord {
    /// Snapshot a room at teardown
    #[must_use]
    pub fn from_room(room: &Room) -> Self {
        Self {
            room: room.id(),
            text: room.artifact().to_string(),
            capacity: room.capacity(),
            turns: room.turn().saturating_sub(1),
            phase: room.phase(),
            completed_at: Utc::now(),
            digest: blake3::hash(room.artifact().as_bytes()).to_hex().to_string(),
        }
    }
}

/// Durable document sink
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync + std::fmt::Debug {
    /// Store one record
    async fn insert(&self, record: ArtifactRecord) -> Result<(), PersistError>;
}

/// Outcome of a successful save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Bounded-retry front of an [`ArtifactSink`]
#[derive(Debug, Clone)]
pub struct PersistenceGateway {
    sink: Arc<dyn ArtifactSink>,
    attempts: u32,
    delay: Duration,
}

impl PersistenceGateway {
    /// Create gateway; at least one attempt is always made
    #[inline]
    #[must_use]
    pub fn new(sink: Arc<dyn ArtifactSink>, attempts: u32, delay: Duration) -> Self {
        Self {
            sink,
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Save `record`, retrying transient failures
    ///
    /// # Errors
    /// `PersistError::Exhausted` once every attempt failed, or as soon as the
    /// sink reports a failure that cannot succeed on retry.
    pub async fn save(&self, record: &ArtifactRecord) -> Result<SaveReceipt, PersistError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.insert(record.clone()).await {
                Ok(()) => return Ok(SaveReceipt { attempts: attempt }),
                Err(e) => {
                    let retry = e.is_retryable() && attempt < self.attempts;
                    tracing::warn!(
                        room = %record.room,
                        attempt,
                        max_attempts = self.attempts,
                        retry,
                        "artifact save failed: {e}"
                    );
                    if !retry {
                        return Err(PersistError::Exhausted {
                            room: record.room,
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

/// In-process sink, for tests and the simulator
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ArtifactRecord>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records stored so far
    #[must_use]
    pub fn records(&self) -> Vec<ArtifactRecord> {
        self.records.lock().clone()
    }

    /// Stored record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing was stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn insert(&self, record: ArtifactRecord) -> Result<(), PersistError> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Appends one JSON document per line to a file
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlSink {
    /// Sink writing to `path`; the file is created on first insert
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ArtifactSink for JsonlSink {
    async fn insert(&self, record: ArtifactRecord) -> Result<(), PersistError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
