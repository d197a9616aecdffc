//! Task descriptors: `<handler-kind>:<payload>` on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A descriptor that does not carry a handler kind.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed task descriptor (expected `kind:payload`): {0:?}")]
pub struct MalformedDescriptor(pub String);

/// One unit of backlog work, opaque to the queue.
///
/// Only the worker splits a descriptor into `(handler-kind, payload)`.
/// Duplicate descriptors are legal; dedup happens at the content
/// fingerprint layer, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskDescriptor(String);

impl TaskDescriptor {
    pub fn new(kind: &str, payload: &str) -> Self {
        Self(format!("{kind}:{payload}"))
    }

    /// Wrap a raw wire string without validating it; a malformed descriptor
    /// surfaces when the worker splits it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(handler-kind, payload)` on the first `:` only, so
    /// payloads may carry colons of their own.
    pub fn split(&self) -> Result<(&str, &str), MalformedDescriptor> {
        self.0
            .split_once(':')
            .filter(|(kind, _)| !kind.is_empty())
            .ok_or_else(|| MalformedDescriptor(self.0.clone()))
    }
}

impl std::fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
