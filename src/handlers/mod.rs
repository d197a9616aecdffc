//! The pluggable task handler contract and its registry.
//!
//! Site scrapers implement [`TaskHandler`] and register under their
//! handler-kind; the worker resolves kinds at dispatch time. Handlers are
//! plain values selected through the registry: task production, execution,
//! and text extraction are the whole contract.

mod probe;

pub use probe::ProbeHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::dedup::DedupStore;
use crate::models::{ResultRecord, SessionId, SourceUniverse};
use crate::queue::TaskDescriptor;
use crate::store::StoreError;

/// Unrecoverable handler failure for one task.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("source unreachable: {0}")]
    Unreachable(String),
    #[error("failed to parse source content: {0}")]
    Parse(String),
    #[error("bad payload {payload:?}: {reason}")]
    Payload { payload: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared services a handler may use while executing one task.
pub struct TaskContext<'a> {
    pub dedup: &'a DedupStore,
    pub session: &'a SessionId,
}

/// What one execution produced: the records that survived the dedup claim,
/// and how many candidates were dropped as already claimed.
#[derive(Debug, Default)]
pub struct HandlerOutput {
    pub records: Vec<ResultRecord>,
    pub skipped: usize,
}

/// A pluggable source scraper.
///
/// The handler (not the worker) computes each candidate's fingerprint and
/// claims it through `ctx.dedup`; candidates whose claim fails are dropped
/// and counted in [`HandlerOutput::skipped`], never treated as failures.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The handler-kind this implementation answers to.
    fn kind(&self) -> &str;

    /// Lazily produce this kind's task descriptors for one enqueuing run.
    /// Calling again yields a fresh, restartable sequence.
    fn produce_tasks(
        &self,
        universe: &SourceUniverse,
    ) -> Box<dyn Iterator<Item = TaskDescriptor> + Send>;

    /// Execute one task payload.
    async fn execute(
        &self,
        payload: &str,
        ctx: &TaskContext<'_>,
    ) -> Result<HandlerOutput, HandlerError>;

    /// Text the search-index migration will index for a record.
    fn searchable_text(&self, record: &ResultRecord) -> String {
        format!("{}{}", record.title, record.text)
    }
}

/// Static handler-kind -> handler mapping, built once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its kind. Last registration wins.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(kind).cloned()
    }

    /// Registered kinds, sorted for stable output.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
