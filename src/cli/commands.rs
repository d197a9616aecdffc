//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::dedup::DedupStore;
use crate::gc::GarbageCollector;
use crate::handlers::{HandlerRegistry, ProbeHandler, TaskHandler};
use crate::models::SessionId;
use crate::persistence::JsonlPersistence;
use crate::queue::LeaseQueue;
use crate::store::TtlStore;
use crate::worker::Worker;

#[derive(Parser)]
#[command(name = "lurk")]
#[command(about = "Distributed scrape-fleet coordinator")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "LURK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the backlog from the configured source universe
    Enqueue {
        /// Handler kinds to produce tasks for (defaults to configured sources)
        kinds: Vec<String>,
    },

    /// Run a worker until the queue drains
    Work {
        /// Lease duration in seconds (defaults to config)
        #[arg(long)]
        lease_secs: Option<u64>,
    },

    /// Reclaim expired leases
    Gc {
        /// Keep sweeping on the configured interval instead of exiting
        /// after one sweep
        #[arg(long)]
        watch: bool,
    },

    /// Show backlog and in-flight counts
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let store = connect_store(&settings).await?;
    let session = SessionId::generate();
    let queue = LeaseQueue::new(Arc::clone(&store), &settings.queue_name, session);

    match cli.command {
        Commands::Enqueue { kinds } => enqueue(&settings, &queue, kinds).await,
        Commands::Work { lease_secs } => work(&settings, store, queue, lease_secs).await,
        Commands::Gc { watch } => gc(&settings, queue, watch).await,
        Commands::Status => status(&queue).await,
    }
}

#[cfg(feature = "redis-backend")]
async fn connect_store(settings: &Settings) -> anyhow::Result<Arc<dyn TtlStore>> {
    let store = crate::store::RedisStore::connect(&settings.redis_url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis-backend"))]
async fn connect_store(_settings: &Settings) -> anyhow::Result<Arc<dyn TtlStore>> {
    anyhow::bail!("built without the redis-backend feature; no shared store to connect to")
}

/// Handlers compiled into this binary, filtered down to the kinds the
/// deployment enables. Site scrapers register here as they are ported into
/// the fleet.
fn build_registry(settings: &Settings) -> HandlerRegistry {
    let available: Vec<Arc<dyn TaskHandler>> = vec![Arc::new(ProbeHandler)];

    let mut registry = HandlerRegistry::new();
    for handler in available {
        if settings.sources.iter().any(|s| s == handler.kind()) {
            registry.register(handler);
        }
    }
    registry
}

async fn enqueue(
    settings: &Settings,
    queue: &LeaseQueue,
    kinds: Vec<String>,
) -> anyhow::Result<()> {
    let registry = build_registry(settings);
    let kinds = if kinds.is_empty() {
        settings.sources.clone()
    } else {
        kinds
    };
    let universe = settings.universe();

    let mut total = 0usize;
    for kind in &kinds {
        let handler = registry
            .get(kind)
            .ok_or_else(|| anyhow::anyhow!("no handler registered for kind {kind:?}"))?;

        let mut count = 0usize;
        for descriptor in handler.produce_tasks(&universe) {
            queue.enqueue(&descriptor).await?;
            count += 1;
        }
        println!(
            "  {} {} tasks for {}",
            style("+").green(),
            count,
            style(kind).cyan()
        );
        total += count;
    }

    println!("{} enqueued {} tasks", style("done:").green().bold(), total);
    Ok(())
}

async fn work(
    settings: &Settings,
    store: Arc<dyn TtlStore>,
    queue: LeaseQueue,
    lease_secs: Option<u64>,
) -> anyhow::Result<()> {
    println!("worker session {}", style(queue.session()).cyan());

    let dedup = DedupStore::new(
        Arc::clone(&store),
        &settings.dedup_prefix,
        queue.session().clone(),
    )
    .with_default_ttl(settings.claim_ttl());
    let sink = Arc::new(JsonlPersistence::new(&settings.results_path));
    let lease = lease_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.lease_duration());

    let worker = Worker::new(
        queue,
        dedup,
        Arc::new(build_registry(settings)),
        sink,
        lease,
        settings.block_timeout(),
    );
    let report = worker.drain().await?;

    println!(
        "{} {} tasks, {} records, {} skipped, {} failed",
        style("drained:").green().bold(),
        report.completed,
        report.succeeded,
        report.skipped,
        report.failed
    );
    Ok(())
}

async fn gc(settings: &Settings, queue: LeaseQueue, watch: bool) -> anyhow::Result<()> {
    let collector = GarbageCollector::new(queue);
    if watch {
        collector.run(settings.gc_interval()).await;
        Ok(())
    } else {
        let reclaimed = collector.sweep_once().await?;
        println!(
            "{} reclaimed {} expired leases",
            style("swept:").green().bold(),
            reclaimed
        );
        Ok(())
    }
}

async fn status(queue: &LeaseQueue) -> anyhow::Result<()> {
    let counts = queue.counts().await?;
    println!("backlog:   {}", style(counts.backlog).cyan());
    println!("in-flight: {}", style(counts.in_flight).cyan());
    Ok(())
}
