//! The lease queue: checkout-with-lease, completion, and the expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::SessionId;
use crate::store::{StoreError, TtlStore};

use super::TaskDescriptor;

/// Backlog and in-flight sizes, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounts {
    pub backlog: u64,
    pub in_flight: u64,
}

/// Distributed work queue with per-item leases.
///
/// Checkout atomically moves one item from the backlog to the in-flight list
/// and stamps a lease key under the caller's session. A worker that dies
/// mid-task just lets its lease expire; the sweep returns the item to the
/// backlog. That expiry path is the system's only crash-recovery mechanism,
/// so interrupted tasks re-execute at least once and the dedup layer absorbs
/// the repeats.
#[derive(Clone)]
pub struct LeaseQueue {
    store: Arc<dyn TtlStore>,
    name: String,
    processing: String,
    lease_prefix: String,
    session: SessionId,
}

impl LeaseQueue {
    pub fn new(store: Arc<dyn TtlStore>, name: &str, session: SessionId) -> Self {
        Self {
            store,
            name: name.to_string(),
            processing: format!("{name}:processing"),
            lease_prefix: format!("{name}:leased_by_session:"),
            session,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Lease key for an item.
    fn item_key(&self, raw: &str) -> String {
        let digest = Sha256::digest(raw.as_bytes());
        format!("{}{}", self.lease_prefix, hex::encode(digest))
    }

    /// Append a descriptor to the backlog.
    ///
    /// No uniqueness check: re-running a period enqueues duplicates on
    /// purpose.
    pub async fn enqueue(&self, descriptor: &TaskDescriptor) -> Result<(), StoreError> {
        self.store.push(&self.name, descriptor.as_str()).await
    }

    /// Atomically move one item from backlog to in-flight and lease it to
    /// this session. Blocks up to `block_timeout` when the backlog is empty;
    /// `None` means nothing arrived in time.
    ///
    /// The lease stamp is a second RPC after the atomic move. If it fails,
    /// or the process dies between the two, the item sits in-flight without
    /// a lease until the next sweep requeues it. Nothing is lost, and no
    /// other worker can hold the item meanwhile.
    pub async fn checkout(
        &self,
        lease_duration: Duration,
        block_timeout: Duration,
    ) -> Result<Option<TaskDescriptor>, StoreError> {
        let Some(raw) = self
            .store
            .pop_to_blocking(&self.name, &self.processing, block_timeout)
            .await?
        else {
            return Ok(None);
        };
        self.store
            .set_ex(&self.item_key(&raw), self.session.as_str(), lease_duration)
            .await?;
        debug!("leased {raw}");
        Ok(Some(TaskDescriptor::from_raw(raw)))
    }

    /// Permanently remove a descriptor from in-flight and drop its lease.
    ///
    /// Idempotent: completing an already-completed item, or one the sweep
    /// has already returned to the backlog, is a no-op.
    pub async fn complete(&self, descriptor: &TaskDescriptor) -> Result<(), StoreError> {
        self.store
            .remove(&self.processing, descriptor.as_str())
            .await?;
        self.store
            .delete(&self.item_key(descriptor.as_str()))
            .await?;
        Ok(())
    }

    /// True only when backlog and in-flight are both empty, which is the
    /// drain signal for a finite batch run.
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        let counts = self.counts().await?;
        Ok(counts.backlog == 0 && counts.in_flight == 0)
    }

    pub async fn counts(&self) -> Result<QueueCounts, StoreError> {
        Ok(QueueCounts {
            backlog: self.store.list_len(&self.name).await?,
            in_flight: self.store.list_len(&self.processing).await?,
        })
    }

    /// Return every in-flight item whose lease has expired to the backlog;
    /// returns how many were reclaimed.
    ///
    /// Tolerates completion racing the sweep: the requeue is a single
    /// remove-then-push store operation, so an item completed after the
    /// in-flight snapshot was taken is not resurrected.
    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let mut reclaimed = 0;
        for raw in self.store.list_items(&self.processing).await? {
            if self.store.exists(&self.item_key(&raw)).await? {
                // Lease still live
                continue;
            }
            if self
                .store
                .requeue_if_present(&self.processing, &self.name, &raw)
                .await?
            {
                debug!("requeued expired lease: {raw}");
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }
}
