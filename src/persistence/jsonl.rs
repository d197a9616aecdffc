//! Append-only JSONL file sink.
//!
//! The durable sink the shipped binary uses: one JSON object per line,
//! append-only and id-blind. Downstream import is expected to upsert by
//! `unique_id`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::models::ResultRecord;

use super::{BatchPersistence, BatchReport, PersistError};

pub struct JsonlPersistence {
    path: PathBuf,
}

impl JsonlPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BatchPersistence for JsonlPersistence {
    async fn insert_batch(&self, records: Vec<ResultRecord>) -> Result<BatchReport, PersistError> {
        if records.is_empty() {
            return Ok(BatchReport::default());
        }

        let mut report = BatchReport::default();
        let mut buf = Vec::new();
        for record in records {
            // A record that cannot serialize is rejected per item; the rest
            // of the batch still lands.
            match serde_json::to_vec(&record) {
                Ok(line) => {
                    buf.extend_from_slice(&line);
                    buf.push(b'\n');
                    report.inserted += 1;
                }
                Err(e) => report.failed.push((record.unique_id, e.to_string())),
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        Ok(report)
    }
}
