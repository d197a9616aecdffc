//! Record and identity types shared by the queue, dedup, and persistence
//! layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a content item's natural key (canonical URL or
/// source-provided article id).
///
/// Deduplication is keyed on this, not on the task descriptor that discovered
/// the content: two different tasks finding the same article collapse to one
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a natural key.
    pub fn of(natural_key: &str) -> Self {
        let digest = Sha256::digest(natural_key.as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap an already-computed hex digest.
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one worker process for the lifetime of its run.
///
/// Leases and dedup claims record the session that took them, so abandoned
/// work is attributable when a sweep reclaims it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id, `<hostname>:<uuid>`.
    pub fn generate() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        Self(format!("{host}:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of scraped output.
///
/// Produced by a task handler, owned by the worker until flushed to the batch
/// sink, then owned by the persistence layer. `pending_migration` stays true
/// until the (external) search-index migration picks the record up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Unique key in the downstream document store.
    pub unique_id: String,
    /// Subject tickers the content is about.
    pub tickers: Vec<String>,
    /// Source-side identifier for the article.
    pub source_id: String,
    pub source_link: Option<String>,
    /// Dedup fingerprint of the content's natural key.
    pub fingerprint: Fingerprint,
    pub sector_code: Option<i32>,
    pub sentiment: Option<f64>,
    pub title: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
    pub pending_migration: bool,
}

/// The enqueuer's input: which subjects exist and how far back periodic
/// sources scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUniverse {
    pub tickers: Vec<String>,
    pub duration_days: u32,
}

impl SourceUniverse {
    pub fn new(tickers: Vec<String>, duration_days: u32) -> Self {
        Self {
            tickers,
            duration_days,
        }
    }

    /// Scrape window in hours, the granularity periodic sources slice on.
    pub fn duration_hours(&self) -> u32 {
        self.duration_days.saturating_mul(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let a = Fingerprint::of("http://example.com/article/1");
        let b = Fingerprint::of("http://example.com/article/1");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_differs_by_key() {
        let a = Fingerprint::of("article-1");
        let b = Fingerprint::of("article-2");
        assert_ne!(a, b);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn universe_hours() {
        let universe = SourceUniverse::new(vec!["00700".into()], 3);
        assert_eq!(universe.duration_hours(), 72);
    }
}
