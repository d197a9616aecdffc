//! Distributed lease queue over the backing TTL store.
//!
//! Key layout, shared by every process in the fleet:
//! - `<name>`: backlog list
//! - `<name>:processing`: in-flight list
//! - `<name>:leased_by_session:<sha256 of item>`: lease key; the value is
//!   the holding session, the TTL is the lease duration

mod descriptor;
mod lease;

pub use descriptor::{MalformedDescriptor, TaskDescriptor};
pub use lease::{LeaseQueue, QueueCounts};
