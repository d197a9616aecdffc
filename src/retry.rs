//! Bounded retry with exponential backoff.
//!
//! Callers get a typed outcome: the operation's value, or [`Exhausted`]
//! carrying the final error. There is no path that falls through with
//! nothing to show for the attempts.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Every attempt failed; carries the last error for the caller to act on.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct Exhausted<E: std::error::Error> {
    pub attempts: u32,
    #[source]
    pub last: E,
}

/// Exponential backoff delay for a 0-based attempt number, capped at 60s.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

/// Run `op` up to `attempts` times, sleeping between tries.
pub async fn bounded<T, E, F, Fut>(
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, Exhausted<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut tried = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tried += 1;
                if tried >= attempts {
                    return Err(Exhausted {
                        attempts: tried,
                        last: err,
                    });
                }
                tokio::time::sleep(backoff_delay(tried - 1, base)).await;
            }
        }
    }
}
