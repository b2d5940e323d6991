//! Concurrent per-backend usage counters.

use std::collections::BTreeMap;
use std::time::Duration;

use dashmap::DashMap;
use domain::{BackendKind, TokenCost, TokenCount, UsageStats};

/// Usage statistics keyed by backend kind.
///
/// Each [`record`](Self::record) holds the entry guard for its kind while the
/// running average is folded in, so updates to one kind are serialized while
/// different kinds proceed independently.
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: DashMap<BackendKind, UsageStats>,
}

impl UsageTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one invocation of `kind` into its counters.
    pub fn record(
        &self,
        kind: BackendKind,
        success: bool,
        tokens: TokenCount,
        cost: TokenCost,
        latency: Duration,
    ) {
        self.stats
            .entry(kind)
            .or_default()
            .record(success, tokens, cost, latency);
    }

    /// Copy of the counters for `kind`, if it has ever been invoked.
    pub fn snapshot(&self, kind: BackendKind) -> Option<UsageStats> {
        self.stats.get(&kind).map(|entry| entry.value().clone())
    }

    /// Copies of every kind's counters, ordered by kind.
    pub fn snapshot_all(&self) -> BTreeMap<BackendKind, UsageStats> {
        self.stats
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_kinds_are_tracked_separately() {
        let tracker = UsageTracker::new();
        tracker.record(
            BackendKind::OpenAi,
            true,
            TokenCount::new(10),
            TokenCost::zero(),
            Duration::from_secs(1),
        );
        tracker.record(
            BackendKind::Stub,
            false,
            TokenCount::new(0),
            TokenCost::zero(),
            Duration::from_secs(3),
        );

        let openai = tracker.snapshot(BackendKind::OpenAi).unwrap();
        assert_eq!(openai.total_requests, 1);
        assert_eq!(openai.error_rate, 0.0);
        let stub = tracker.snapshot(BackendKind::Stub).unwrap();
        assert_eq!(stub.failed_requests, 1);
        assert_eq!(stub.error_rate, 1.0);
        assert!(tracker.snapshot(BackendKind::Claude).is_none());
        assert_eq!(
            tracker.snapshot_all().keys().copied().collect::<Vec<_>>(),
            vec![BackendKind::OpenAi, BackendKind::Stub]
        );
    }

    #[test]
    fn test_running_average_matches_exact_mean() {
        let tracker = UsageTracker::new();
        for secs in [10, 20, 30] {
            tracker.record(
                BackendKind::Ollama,
                true,
                TokenCount::new(1),
                TokenCost::zero(),
                Duration::from_secs(secs),
            );
        }
        let stats = tracker.snapshot(BackendKind::Ollama).unwrap();
        assert_eq!(stats.average_latency_secs, 20.0);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let tracker = Arc::new(UsageTracker::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record(
                            BackendKind::Qwen,
                            true,
                            TokenCount::new(2),
                            TokenCost::zero(),
                            Duration::from_millis(5),
                        );
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        let stats = tracker.snapshot(BackendKind::Qwen).unwrap();
        assert_eq!(stats.total_requests, 800);
        assert_eq!(stats.total_tokens.as_u64(), 1600);
    }
}
