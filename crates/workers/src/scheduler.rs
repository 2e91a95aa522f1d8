//! Wall-clock scheduling helpers
//!
//! Converts a target time into a one-shot delay. A target in the past
//! collapses to an immediate trigger.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Sleep;

/// Time remaining until `at`, clamped at zero
pub fn delay_until(at: DateTime<Utc>) -> Duration {
    at.signed_duration_since(Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Consume-once trigger that completes at `at`
///
/// The returned future is owned by a single waiter; awaiting it consumes it.
pub fn trigger_at(at: DateTime<Utc>) -> Sleep {
    tokio::time::sleep(delay_until(at))
}
