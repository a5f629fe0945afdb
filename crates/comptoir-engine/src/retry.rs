//! # Contention Retry
//!
//! Bounded exponential backoff for transient storage contention.
//!
//! ## What Gets Retried
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbError::Busy (SQLITE_BUSY family)     → retried with backoff          │
//! │  Business rules, validation, not-found  → never retried (same input     │
//! │                                           gives the same answer)        │
//! │                                                                         │
//! │  attempt 1 ──busy──► sleep 50ms                                         │
//! │  attempt 2 ──busy──► sleep 100ms                                        │
//! │  attempt 3 ──busy──► sleep 200ms                                        │
//! │  attempt 4 ──busy──► sleep 400ms                                        │
//! │  attempt 5 ──busy──► EngineError::StorageContention { attempts: 5 }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each attempt runs a fresh transaction; the per-operation closures
//! re-read everything they need, so a retry never observes state from a
//! rolled-back attempt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Backoff settings for contended write transactions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts before giving up (the first try counts).
    /// Default: 5
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds).
    /// Default: 50
    pub base_delay_ms: u64,

    /// Ceiling on any single delay (milliseconds).
    /// Default: 1000
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` failed: base doubled per
    /// failure, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

/// Runs `op` until it succeeds, fails permanently, or exhausts the
/// policy. Only [`EngineError::is_retryable`] failures are retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                if attempt >= policy.max_attempts {
                    warn!(attempts = attempt, "Storage contention persisted, giving up");
                    return Err(EngineError::StorageContention { attempts: attempt });
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient storage contention, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
