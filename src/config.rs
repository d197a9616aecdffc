//! Runtime settings: backing store location, queue naming, lease and claim
//! timing.
//!
//! Loaded from an optional TOML file with environment overrides, so a
//! containerized fleet can share one config and differ only by env.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::SourceUniverse;

/// Default lease duration while a worker holds a task.
pub const DEFAULT_LEASE_SECS: u64 = 60;
/// Default checkout block timeout.
pub const DEFAULT_BLOCK_TIMEOUT_SECS: u64 = 2;
/// Default dedup claim TTL: one week, longer than any realistic re-crawl
/// interval.
pub const DEFAULT_CLAIM_TTL_SECS: u64 = 604_800;
/// Default sweep interval for the GC daemon mode.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Redis connection URL for the backing TTL store.
    pub redis_url: String,
    /// Work queue name; the in-flight list and lease keys derive from it.
    pub queue_name: String,
    /// Key prefix for dedup claims.
    pub dedup_prefix: String,
    pub lease_secs: u64,
    pub block_timeout_secs: u64,
    pub claim_ttl_secs: u64,
    pub gc_interval_secs: u64,
    /// How many days back periodic sources scrape.
    pub duration_days: u32,
    /// Where the JSONL result sink writes.
    pub results_path: PathBuf,
    /// Subject universe for task production.
    pub tickers: Vec<String>,
    /// Handler kinds enabled for this deployment.
    pub sources: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            queue_name: "lurk:wq".to_string(),
            dedup_prefix: "lurk:history".to_string(),
            lease_secs: DEFAULT_LEASE_SECS,
            block_timeout_secs: DEFAULT_BLOCK_TIMEOUT_SECS,
            claim_ttl_secs: DEFAULT_CLAIM_TTL_SECS,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
            duration_days: 1,
            results_path: PathBuf::from("results.jsonl"),
            tickers: Vec::new(),
            sources: vec!["probe".to_string()],
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist; with no path, `lurk.toml` in the working
    /// directory is used when present, defaults otherwise. Environment
    /// overrides (`LURK_*`) are applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    anyhow::anyhow!("cannot read config {}: {}", p.display(), e)
                })?;
                toml::from_str(&raw)?
            }
            None => {
                let fallback = Path::new("lurk.toml");
                if fallback.exists() {
                    toml::from_str(&std::fs::read_to_string(fallback)?)?
                } else {
                    Settings::default()
                }
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("LURK_REDIS_URL") {
            self.redis_url = v;
        }
        if let Ok(v) = std::env::var("LURK_QUEUE") {
            self.queue_name = v;
        }
        if let Ok(v) = std::env::var("LURK_DURATION_DAYS") {
            if let Ok(days) = v.parse() {
                self.duration_days = days;
            }
        }
        if let Ok(v) = std::env::var("LURK_RESULTS_PATH") {
            self.results_path = PathBuf::from(v);
        }
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(self.block_timeout_secs)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn universe(&self) -> SourceUniverse {
        SourceUniverse::new(self.tickers.clone(), self.duration_days)
    }
}
