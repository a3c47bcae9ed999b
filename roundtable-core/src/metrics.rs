//! Engine counters for external telemetry collectors.
//!
//! Purely observational: the engine writes, collectors read snapshots, and
//! nothing here ever feeds back into competition behavior.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and samples maintained across competitions.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    competitions_started: AtomicU64,
    competitions_completed: AtomicU64,
    competitions_aborted: AtomicU64,
    provider_wins: Mutex<BTreeMap<String, u64>>,
    provider_losses: Mutex<BTreeMap<String, u64>>,
    stats_durations_ms: Mutex<Vec<f64>>,
}

/// Point-in-time copy of the engine metrics, safe to serialize and ship.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub competitions_started: u64,
    pub competitions_completed: u64,
    pub competitions_aborted: u64,
    pub provider_wins: BTreeMap<String, u64>,
    pub provider_losses: BTreeMap<String, u64>,
    pub stats_durations_ms: Vec<f64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.competitions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.competitions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.competitions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_win(&self, provider_id: &str) {
        let mut wins = self.provider_wins.lock().unwrap_or_else(|p| p.into_inner());
        *wins.entry(provider_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_loss(&self, provider_id: &str) {
        let mut losses = self
            .provider_losses
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        *losses.entry(provider_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_stats_duration_ms(&self, duration_ms: f64) {
        let mut samples = self
            .stats_durations_ms
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        samples.push(duration_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            competitions_started: self.competitions_started.load(Ordering::Relaxed),
            competitions_completed: self.competitions_completed.load(Ordering::Relaxed),
            competitions_aborted: self.competitions_aborted.load(Ordering::Relaxed),
            provider_wins: self
                .provider_wins
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            provider_losses: self
                .provider_losses
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
            stats_durations_ms: self
                .stats_durations_ms
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_completed();
        metrics.record_aborted();
        let snap = metrics.snapshot();
        assert_eq!(snap.competitions_started, 2);
        assert_eq!(snap.competitions_completed, 1);
        assert_eq!(snap.competitions_aborted, 1);
    }

    #[test]
    fn test_win_loss_tallies() {
        let metrics = EngineMetrics::new();
        metrics.record_win("alpha");
        metrics.record_win("alpha");
        metrics.record_loss("beta");
        let snap = metrics.snapshot();
        assert_eq!(snap.provider_wins["alpha"], 2);
        assert_eq!(snap.provider_losses["beta"], 1);
    }

    #[test]
    fn test_stats_durations_recorded() {
        let metrics = EngineMetrics::new();
        metrics.record_stats_duration_ms(1.5);
        metrics.record_stats_duration_ms(2.5);
        assert_eq!(metrics.snapshot().stats_durations_ms, vec![1.5, 2.5]);
    }
}
