//! Batch sink for scraped records.
//!
//! Unordered, best-effort inserts: one bad record never fails the whole
//! batch, and accepted records are never rolled back. Rejected records are
//! reported per item and otherwise discarded; they are not re-queued.

mod jsonl;
mod memory;

pub use jsonl::JsonlPersistence;
pub use memory::InMemoryPersistence;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ResultRecord;

/// The batch never reached the sink at all (no per-item information).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-batch accounting.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: usize,
    /// `(unique_id, error)` for each rejected record.
    pub failed: Vec<(String, String)>,
}

/// Durable sink accepting batches of result records.
#[async_trait]
pub trait BatchPersistence: Send + Sync {
    /// Insert a batch, unordered. Partial failure is reported in the
    /// result, not as an error.
    async fn insert_batch(&self, records: Vec<ResultRecord>) -> Result<BatchReport, PersistError>;
}
