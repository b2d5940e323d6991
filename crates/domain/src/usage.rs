//! Per-backend usage accounting.
//!
//! One [`UsageStats`] exists per backend kind. The record is a plain value;
//! serialising concurrent updates is the job of the owning tracker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Timestamp, TokenCost, TokenCount};

/// Cumulative counters for one backend kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Invocations recorded, successful or not.
    pub total_requests: u64,
    /// Invocations that returned content.
    pub successful_requests: u64,
    /// Invocations that failed.
    pub failed_requests: u64,
    /// Tokens consumed across all invocations.
    pub total_tokens: TokenCount,
    /// Estimated spend across all invocations.
    pub total_cost: TokenCost,
    /// Running mean latency in seconds.
    pub average_latency_secs: f64,
    /// `failed_requests / total_requests`, recomputed after every record.
    pub error_rate: f64,
    /// When the backend was last invoked.
    pub last_used: Option<Timestamp>,
}

impl UsageStats {
    /// Folds one invocation into the counters.
    ///
    /// The mean is updated as `(old × (n − 1) + latency) / n` with `n` taken
    /// after the increment, so the first sample replaces the zero default.
    pub fn record(&mut self, success: bool, tokens: TokenCount, cost: TokenCost, latency: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        self.total_tokens += tokens;
        self.total_cost += cost;

        let n = self.total_requests as f64;
        self.average_latency_secs =
            (self.average_latency_secs * (n - 1.0) + latency.as_secs_f64()) / n;
        self.error_rate = self.failed_requests as f64 / n;
        self.last_used = Some(Timestamp::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_running_average_is_exact() {
        let mut stats = UsageStats::default();
        for latency in [10, 20, 30] {
            stats.record(true, TokenCount::new(5), TokenCost::zero(), secs(latency));
        }
        assert_eq!(stats.average_latency_secs, 20.0);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_tokens.as_u64(), 15);
    }

    #[test]
    fn test_first_sample_replaces_default_average() {
        let mut stats = UsageStats::default();
        stats.record(true, TokenCount::default(), TokenCost::zero(), secs(7));
        assert_eq!(stats.average_latency_secs, 7.0);
        assert!(stats.last_used.is_some());
    }

    #[test]
    fn test_error_rate_tracks_failures() {
        let mut stats = UsageStats::default();
        stats.record(true, TokenCount::default(), TokenCost::zero(), secs(1));
        stats.record(false, TokenCount::default(), TokenCost::zero(), secs(1));
        stats.record(false, TokenCount::default(), TokenCost::zero(), secs(1));
        stats.record(true, TokenCount::default(), TokenCost::zero(), secs(1));
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.error_rate, 0.5);
    }

    #[test]
    fn test_cost_accumulates() {
        let mut stats = UsageStats::default();
        let cost = TokenCost::new(0.25).unwrap();
        stats.record(true, TokenCount::new(1), cost, secs(1));
        stats.record(true, TokenCount::new(1), cost, secs(1));
        assert_eq!(stats.total_cost.as_f64(), 0.5);
    }
}
