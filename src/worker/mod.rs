//! The worker loop: checkout, dispatch, flush, and acknowledge until the
//! queue drains.
//!
//! Per task: lease -> execute -> flush -> ack. The lease is always
//! completed once execution has run: retrying a non-idempotent fetch costs
//! more than the data-loss risk on one pass, and a poisoned task must never
//! block the queue. If the process dies before the ack, the lease expires
//! and the sweep requeues the task; the dedup layer absorbs the
//! re-execution.

mod outcome;

pub use outcome::{RunReport, TaskOutcome};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::dedup::DedupStore;
use crate::handlers::{HandlerRegistry, TaskContext};
use crate::persistence::BatchPersistence;
use crate::queue::{LeaseQueue, TaskDescriptor};
use crate::retry::{self, Exhausted};
use crate::store::StoreError;

/// Attempts for queue RPCs before a run aborts.
const QUEUE_RPC_ATTEMPTS: u32 = 3;
/// Base backoff between queue RPC retries.
const QUEUE_RPC_BACKOFF: Duration = Duration::from_millis(200);

/// The run aborted because the backing store stayed unreachable.
#[derive(Debug, Error)]
#[error("queue unavailable: {0}")]
pub struct RunAborted(#[from] Exhausted<StoreError>);

pub struct Worker {
    queue: LeaseQueue,
    dedup: DedupStore,
    registry: Arc<HandlerRegistry>,
    sink: Arc<dyn BatchPersistence>,
    lease_duration: Duration,
    block_timeout: Duration,
}

impl Worker {
    pub fn new(
        queue: LeaseQueue,
        dedup: DedupStore,
        registry: Arc<HandlerRegistry>,
        sink: Arc<dyn BatchPersistence>,
        lease_duration: Duration,
        block_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            dedup,
            registry,
            sink,
            lease_duration,
            block_timeout,
        }
    }

    /// Drain the queue: loop until it is empty and no lease arrives within
    /// the block timeout.
    ///
    /// A checkout that returns nothing while the queue is non-empty means
    /// another session holds the remaining work in flight; the loop keeps
    /// waiting for completions or expiries rather than exiting early.
    pub async fn drain(&self) -> Result<RunReport, RunAborted> {
        let mut report = RunReport::default();
        info!("worker {} draining queue", self.queue.session());

        loop {
            let leased = retry::bounded(QUEUE_RPC_ATTEMPTS, QUEUE_RPC_BACKOFF, || {
                self.queue.checkout(self.lease_duration, self.block_timeout)
            })
            .await?;

            match leased {
                Some(descriptor) => {
                    let task = self.process(&descriptor).await;
                    report.absorb(task);
                    retry::bounded(QUEUE_RPC_ATTEMPTS, QUEUE_RPC_BACKOFF, || {
                        self.queue.complete(&descriptor)
                    })
                    .await?;
                }
                None => {
                    let empty =
                        retry::bounded(QUEUE_RPC_ATTEMPTS, QUEUE_RPC_BACKOFF, || {
                            self.queue.is_empty()
                        })
                        .await?;
                    if empty {
                        break;
                    }
                }
            }
        }

        info!(
            "worker {} drained: {} tasks, {} records, {} skipped, {} failed",
            self.queue.session(),
            report.completed,
            report.succeeded,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Execute one leased task.
    ///
    /// Never returns an error: every failure mode lands in the outcome so
    /// the caller completes the lease regardless.
    async fn process(&self, descriptor: &TaskDescriptor) -> TaskOutcome {
        let mut outcome = TaskOutcome::default();

        let (kind, payload) = match descriptor.split() {
            Ok(parts) => parts,
            Err(e) => {
                warn!("{e}; completing without execution");
                outcome.failed += 1;
                return outcome;
            }
        };

        let Some(handler) = self.registry.get(kind) else {
            warn!("no handler registered for kind {kind:?}; completing without execution");
            outcome.failed += 1;
            return outcome;
        };

        let ctx = TaskContext {
            dedup: &self.dedup,
            session: self.queue.session(),
        };

        let output = match handler.execute(payload, &ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!("handler {kind}:{payload} failed: {e}");
                outcome.failed += 1;
                return outcome;
            }
        };
        outcome.skipped += output.skipped;

        if output.records.is_empty() {
            return outcome;
        }

        // Flush failures never fail the lease: the fetch already happened.
        let batch_len = output.records.len();
        match self.sink.insert_batch(output.records).await {
            Ok(batch) => {
                outcome.succeeded += batch.inserted;
                outcome.failed += batch.failed.len();
                for (unique_id, error) in &batch.failed {
                    warn!("record {unique_id} rejected by sink: {error}");
                }
            }
            Err(e) => {
                warn!("batch flush for {kind}:{payload} failed: {e}");
                outcome.failed += batch_len;
            }
        }

        outcome
    }
}
