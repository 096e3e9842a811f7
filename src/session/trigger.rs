//! When to renew a token.

use crate::auth::VaultToken;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Extra room on top of the lead time before a lease counts as too short to use
const SAFETY_MARGIN: Duration = Duration::from_secs(2);

/// Renewals never fire sooner than this after scheduling
const MIN_DELAY: Duration = Duration::from_secs(1);

/// Fixed-lead-time renewal policy.
///
/// A renewal fires `lead_time` before the lease runs out, but never sooner than
/// one second from now. A renewed lease at or below `lead_time + 2s` is treated
/// as unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTrigger {
    lead_time: Duration,
    min_valid_threshold: Duration,
}

impl Default for RefreshTrigger {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

impl RefreshTrigger {
    pub fn new(lead_time: Duration) -> Self {
        Self { lead_time, min_valid_threshold: lead_time + SAFETY_MARGIN }
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    pub fn min_valid_threshold(&self) -> Duration {
        self.min_valid_threshold
    }

    /// Delay until the renewal for a lease of the given length
    pub fn renewal_delay(&self, lease_duration: Duration) -> Duration {
        lease_duration.saturating_sub(self.lead_time).max(MIN_DELAY)
    }

    /// Absolute instant at which `token` should be renewed
    pub fn next_execution_time(&self, token: &VaultToken, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = self.renewal_delay(token.lease_duration());
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether a lease is too short to keep the token
    pub fn is_below_threshold(&self, lease_duration: Duration) -> bool {
        lease_duration <= self.min_valid_threshold
    }
}
