//! Content-claim store: "has anyone in the fleet claimed this item
//! recently?"
//!
//! Repeated source queries return overlapping content (the same search page
//! revisited daily); without the claim step every worker would re-ingest the
//! same article on every pass. A claim is one TTL'd key: after expiry the
//! content becomes claimable again, trading bounded staleness for bounded
//! storage.

use std::sync::Arc;
use std::time::Duration;

use crate::models::{Fingerprint, SessionId};
use crate::store::{StoreError, TtlStore};

/// Default claim lifetime: one week, longer than any realistic re-crawl
/// interval.
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(604_800);

/// Fleet-wide fingerprint claims over the backing TTL store.
#[derive(Clone)]
pub struct DedupStore {
    store: Arc<dyn TtlStore>,
    prefix: String,
    session: SessionId,
    default_ttl: Duration,
}

impl DedupStore {
    pub fn new(store: Arc<dyn TtlStore>, prefix: &str, session: SessionId) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            session,
            default_ttl: DEFAULT_CLAIM_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn claim_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}:{}", self.prefix, fingerprint)
    }

    /// True while a live claim exists for `fingerprint`.
    pub async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        self.store.exists(&self.claim_key(fingerprint)).await
    }

    /// Atomically claim `fingerprint` for this session.
    ///
    /// True means the claim was created: the caller owns the content and
    /// should process it. False means a live claim already exists and the
    /// caller must skip the item as a duplicate. That is a first-class
    /// outcome, not an error.
    pub async fn try_claim(
        &self,
        fingerprint: &Fingerprint,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.store
            .set_nx_ex(
                &self.claim_key(fingerprint),
                self.session.as_str(),
                ttl.unwrap_or(self.default_ttl),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn dedup(store: &Arc<dyn TtlStore>) -> DedupStore {
        DedupStore::new(Arc::clone(store), "history", SessionId::generate())
    }

    #[tokio::test]
    async fn second_claim_is_rejected() {
        let store: Arc<dyn TtlStore> = Arc::new(InMemoryStore::new());
        let d = dedup(&store);
        let fp = Fingerprint::of("article-123");

        assert!(d.try_claim(&fp, None).await.unwrap());
        assert!(!d.try_claim(&fp, None).await.unwrap());
        assert!(d.exists(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn claims_are_fleet_wide() {
        let store: Arc<dyn TtlStore> = Arc::new(InMemoryStore::new());
        let worker_a = dedup(&store);
        let worker_b = dedup(&store);
        let fp = Fingerprint::of("shared-article");

        assert!(worker_a.try_claim(&fp, None).await.unwrap());
        assert!(!worker_b.try_claim(&fp, None).await.unwrap());
    }

    #[tokio::test]
    async fn expired_claim_is_claimable_again() {
        let store: Arc<dyn TtlStore> = Arc::new(InMemoryStore::new());
        let worker_a = dedup(&store);
        let worker_b = dedup(&store);
        let fp = Fingerprint::of("abc");

        assert!(worker_a
            .try_claim(&fp, Some(Duration::from_millis(30)))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!worker_b.exists(&fp).await.unwrap());
        assert!(worker_b.try_claim(&fp, None).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_fingerprints_are_independent() {
        let store: Arc<dyn TtlStore> = Arc::new(InMemoryStore::new());
        let d = dedup(&store);

        assert!(d.try_claim(&Fingerprint::of("a"), None).await.unwrap());
        assert!(d.try_claim(&Fingerprint::of("b"), None).await.unwrap());
    }
}
