// =============================================================================
// Uptime Prober (C9) — periodic external-reachability check
// =============================================================================
//
// Pings a stable external endpoint on a fixed interval and tracks a running
// success/failure count. Exposed at `/api/status` as a percentage; reset via
// `POST /api/reset-uptime-stats`.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_URL: &str = "https://api.hyperliquid.xyz/info";

pub struct UptimeStats {
    total_pings: AtomicU64,
    successful_pings: AtomicU64,
    failed_pings: AtomicU64,
    monitoring_since: RwLock<DateTime<Utc>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UptimeSnapshot {
    pub total_pings: u64,
    pub successful_pings: u64,
    pub failed_pings: u64,
    pub percentage: f64,
    pub monitoring_since: DateTime<Utc>,
}

impl UptimeStats {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            total_pings: AtomicU64::new(0),
            successful_pings: AtomicU64::new(0),
            failed_pings: AtomicU64::new(0),
            monitoring_since: RwLock::new(now),
        })
    }

    fn record(&self, ok: bool) {
        self.total_pings.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.successful_pings.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_pings.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fraction of pings that succeeded, as a percentage. A probe history of
    /// zero pings reads as fully healthy rather than 0%.
    pub fn percentage(&self) -> f64 {
        let total = self.total_pings.load(Ordering::Relaxed);
        if total == 0 {
            return 100.0;
        }
        let successful = self.successful_pings.load(Ordering::Relaxed);
        (successful as f64 / total as f64) * 100.0
    }

    pub fn snapshot(&self) -> UptimeSnapshot {
        UptimeSnapshot {
            total_pings: self.total_pings.load(Ordering::Relaxed),
            successful_pings: self.successful_pings.load(Ordering::Relaxed),
            failed_pings: self.failed_pings.load(Ordering::Relaxed),
            percentage: self.percentage(),
            monitoring_since: *self.monitoring_since.read(),
        }
    }

    pub fn reset(&self, now: DateTime<Utc>) {
        self.total_pings.store(0, Ordering::Relaxed);
        self.successful_pings.store(0, Ordering::Relaxed);
        self.failed_pings.store(0, Ordering::Relaxed);
        *self.monitoring_since.write() = now;
    }
}

/// Spawns the background probe loop. Runs until the process exits; probe
/// failures are logged but never propagated.
pub fn spawn(stats: Arc<UptimeStats>) {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .expect("failed to build uptime probe client");

        let mut interval = tokio::time::interval(PROBE_INTERVAL);
        loop {
            interval.tick().await;
            let ok = match client.get(PROBE_URL).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    warn!(error = %e, "uptime probe failed");
                    false
                }
            };
            stats.record(ok);
        }
    });
    info!(url = PROBE_URL, interval_secs = PROBE_INTERVAL.as_secs(), "uptime prober started");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn zero_pings_reads_as_fully_healthy() {
        let stats = UptimeStats::new(fixed_now());
        assert_eq!(stats.percentage(), 100.0);
    }

    #[test]
    fn percentage_reflects_recorded_outcomes() {
        let stats = UptimeStats::new(fixed_now());
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert!((stats.percentage() - (200.0 / 3.0)).abs() < 1e-9);

        let snap = stats.snapshot();
        assert_eq!(snap.total_pings, 3);
        assert_eq!(snap.successful_pings, 2);
        assert_eq!(snap.failed_pings, 1);
        assert_eq!(snap.total_pings, snap.successful_pings + snap.failed_pings);
    }

    #[test]
    fn reset_clears_counters_and_restamps_monitoring_since() {
        let stats = UptimeStats::new(fixed_now());
        stats.record(false);
        let later = fixed_now() + chrono::Duration::hours(1);
        stats.reset(later);

        let snap = stats.snapshot();
        assert_eq!(snap.total_pings, 0);
        assert_eq!(snap.percentage, 100.0);
        assert_eq!(snap.monitoring_since, later);
    }
}
