//! Per-backend minimum-interval rate limiting, shared by every request.
//!
//! Each backend owns one mutex-guarded timestamp. `acquire` reserves the next
//! free slot under the lock and then sleeps until that slot *outside* the lock,
//! so concurrent requests queue up behind each other without blocking callers
//! of other backends.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use metrics::histogram;
use tokio::time::Instant;
use tracing::debug;

use crate::backends::BackendId;
use crate::error::BackendError;

#[derive(Debug)]
struct Slot {
    min_interval: Duration,
    last_invocation: Mutex<Option<Instant>>,
}

/// Process-wide rate-limit state. Built once at engine construction.
#[derive(Debug)]
pub struct RateLimiter {
    slots: HashMap<BackendId, Slot>,
}

impl RateLimiter {
    pub fn new<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (BackendId, Duration)>,
    {
        let slots = intervals
            .into_iter()
            .map(|(id, min_interval)| {
                (
                    id,
                    Slot {
                        min_interval,
                        last_invocation: Mutex::new(None),
                    },
                )
            })
            .collect();
        Self { slots }
    }

    pub fn min_interval(&self, id: BackendId) -> Duration {
        self.slots
            .get(&id)
            .map(|s| s.min_interval)
            .unwrap_or(Duration::ZERO)
    }

    pub fn last_invocation(&self, id: BackendId) -> Option<Instant> {
        let slot = self.slots.get(&id)?;
        *slot
            .last_invocation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until `backend` may be invoked again and record the invocation.
    ///
    /// Returns the granted invocation instant. If that instant would fall
    /// after `deadline`, nothing is reserved and a timeout is returned
    /// immediately.
    pub async fn acquire(
        &self,
        backend: BackendId,
        deadline: Option<Instant>,
    ) -> Result<Instant, BackendError> {
        let Some(slot) = self.slots.get(&backend) else {
            return Ok(Instant::now());
        };

        let now = Instant::now();
        let granted = {
            let mut last = slot
                .last_invocation
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let earliest = match *last {
                Some(prev) => (prev + slot.min_interval).max(now),
                None => now,
            };
            if let Some(deadline) = deadline {
                if earliest > deadline {
                    return Err(BackendError::Timeout {
                        after_ms: deadline.saturating_duration_since(now).as_millis() as u64,
                    });
                }
            }
            *last = Some(earliest);
            earliest
        };

        let wait = granted.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!(target: "rate_limit", backend = backend.as_str(), wait_ms = wait.as_millis() as u64, "waiting for slot");
            histogram!("sentiment_rate_limit_wait_ms", "backend" => backend.as_str())
                .record(wait.as_secs_f64() * 1_000.0);
            tokio::time::sleep_until(granted).await;
        }
        Ok(granted)
    }
}
