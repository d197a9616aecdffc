//! In-memory sink keyed by `unique_id`.
//!
//! Mirrors a unique-index document store: a duplicate id is rejected per
//! item while the rest of the batch lands. Used by tests and local smoke
//! runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::ResultRecord;

use super::{BatchPersistence, BatchReport, PersistError};

#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    records: Arc<Mutex<HashMap<String, ResultRecord>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn get(&self, unique_id: &str) -> Option<ResultRecord> {
        self.records.lock().await.get(unique_id).cloned()
    }
}

#[async_trait]
impl BatchPersistence for InMemoryPersistence {
    async fn insert_batch(&self, records: Vec<ResultRecord>) -> Result<BatchReport, PersistError> {
        let mut stored = self.records.lock().await;
        let mut report = BatchReport::default();
        for record in records {
            if stored.contains_key(&record.unique_id) {
                report
                    .failed
                    .push((record.unique_id, "duplicate unique_id".to_string()));
            } else {
                stored.insert(record.unique_id.clone(), record);
                report.inserted += 1;
            }
        }
        Ok(report)
    }
}
