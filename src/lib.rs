//! newslurk - distributed scrape-fleet coordination.
//!
//! Many independent worker processes pull scraping tasks from a shared
//! backlog, hold a time-bounded lease while they work, and skip content any
//! worker in the fleet has already claimed. Crash recovery is lease expiry
//! plus an out-of-band sweep; no central scheduler process has to stay alive.
//!
//! Site scrapers are external collaborators: they plug in through
//! [`handlers::TaskHandler`] and the downstream document store through
//! [`persistence::BatchPersistence`]. Everything durable in this crate lives
//! in the backing TTL key store ([`store::TtlStore`]).

pub mod cli;
pub mod config;
pub mod dedup;
pub mod gc;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod queue;
pub mod retry;
pub mod store;
pub mod worker;
