//! Fleet-wide counters
//!
//! Sessions only ever add to these; nothing reads them while the fleet runs
//! except the periodic status line and the final summary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shared counters for every session in a fleet
#[derive(Debug)]
pub struct FleetMetrics {
    pub sessions_launched: AtomicU64,
    pub sessions_registered: AtomicU64,
    pub sessions_failed: AtomicU64,

    pub reports_sent: AtomicU64,
    pub reports_succeeded: AtomicU64,
    pub reports_failed: AtomicU64,
    pub ids_learned: AtomicU64,

    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,

    /// Report round-trip latency (microseconds)
    pub report_latency: RwLock<Histogram<u64>>,

    /// Failures by kind
    pub error_counts: RwLock<HashMap<String, u64>>,

    started: Instant,
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetMetrics {
    pub fn new() -> Self {
        Self {
            sessions_launched: AtomicU64::new(0),
            sessions_registered: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            reports_sent: AtomicU64::new(0),
            reports_succeeded: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            ids_learned: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            report_latency: RwLock::new(
                Histogram::new_with_bounds(1, 3_600_000_000, 3).expect("static bounds"), // 1µs to 1h
            ),
            error_counts: RwLock::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    pub fn record_launch(&self) {
        self.sessions_launched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registered(&self) {
        self.sessions_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failure(&self, kind: &str) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
        self.record_error(kind);
    }

    pub fn record_traffic(&self, sent: u64, received: u64) {
        self.bytes_sent.fetch_add(sent, Ordering::Relaxed);
        self.bytes_received.fetch_add(received, Ordering::Relaxed);
    }

    pub fn record_report_success(&self, latency_us: u64, ids_learned: u64) {
        self.reports_sent.fetch_add(1, Ordering::Relaxed);
        self.reports_succeeded.fetch_add(1, Ordering::Relaxed);
        self.ids_learned.fetch_add(ids_learned, Ordering::Relaxed);
        self.record_latency(latency_us);
    }

    pub fn record_report_failure(&self, kind: &str, latency_us: u64) {
        self.reports_sent.fetch_add(1, Ordering::Relaxed);
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
        self.record_error(kind);
        self.record_latency(latency_us);
    }

    fn record_latency(&self, latency_us: u64) {
        if let Err(e) = self.report_latency.write().record(latency_us.max(1)) {
            warn!("Failed to record latency: {}", e);
        }
    }

    fn record_error(&self, kind: &str) {
        *self.error_counts.write().entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn summary(&self) -> FleetSummary {
        let hist = self.report_latency.read();
        let sent = self.reports_sent.load(Ordering::Relaxed);
        let succeeded = self.reports_succeeded.load(Ordering::Relaxed);

        FleetSummary {
            duration_secs: self.started.elapsed().as_secs_f64(),
            sessions_launched: self.sessions_launched.load(Ordering::Relaxed),
            sessions_registered: self.sessions_registered.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            reports_sent: sent,
            reports_succeeded: succeeded,
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            report_success_rate: if sent > 0 {
                (succeeded as f64 / sent as f64) * 100.0
            } else {
                0.0
            },
            ids_learned: self.ids_learned.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            latency_p50_us: hist.value_at_quantile(0.50),
            latency_p99_us: hist.value_at_quantile(0.99),
            latency_max_us: hist.max(),
            error_counts: self.error_counts.read().clone(),
        }
    }
}

/// Snapshot of [`FleetMetrics`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub duration_secs: f64,
    pub sessions_launched: u64,
    pub sessions_registered: u64,
    pub sessions_failed: u64,
    pub reports_sent: u64,
    pub reports_succeeded: u64,
    pub reports_failed: u64,
    pub report_success_rate: f64,
    pub ids_learned: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub latency_p50_us: u64,
    pub latency_p99_us: u64,
    pub latency_max_us: u64,
    pub error_counts: HashMap<String, u64>,
}

impl FleetSummary {
    pub fn print_report(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   DRIP FLEET RUN SUMMARY                     ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Duration:          {:>10.2} seconds                        ║", self.duration_secs);
        println!("║ Sessions launched: {:>10}                                 ║", self.sessions_launched);
        println!("║ Registered:        {:>10}                                 ║", self.sessions_registered);
        println!("║ Failed:            {:>10}                                 ║", self.sessions_failed);
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Reports sent:      {:>10}                                 ║", self.reports_sent);
        println!("║ Succeeded:         {:>10}                                 ║", self.reports_succeeded);
        println!("║ Failed:            {:>10}                                 ║", self.reports_failed);
        println!("║ Success rate:      {:>10.2}%                               ║", self.report_success_rate);
        println!("║ Metric ids learned:{:>10}                                 ║", self.ids_learned);
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ REPORT LATENCY (microseconds)                                ║");
        println!("║   p50:             {:>10}                                 ║", self.latency_p50_us);
        println!("║   p99:             {:>10}                                 ║", self.latency_p99_us);
        println!("║   max:             {:>10}                                 ║", self.latency_max_us);
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Bytes sent:        {:>10}                                 ║", self.bytes_sent);
        println!("║ Bytes received:    {:>10}                                 ║", self.bytes_received);

        if !self.error_counts.is_empty() {
            println!("╠══════════════════════════════════════════════════════════════╣");
            println!("║ ERRORS                                                       ║");
            for (kind, count) in &self.error_counts {
                println!("║   {:20}: {:>10}                         ║", kind, count);
            }
        }

        println!("╚══════════════════════════════════════════════════════════════╝\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counters() {
        let metrics = FleetMetrics::new();
        metrics.record_report_success(1_500, 3);
        metrics.record_report_success(2_500, 0);
        metrics.record_report_failure("status", 900);

        let summary = metrics.summary();
        assert_eq!(summary.reports_sent, 3);
        assert_eq!(summary.reports_succeeded, 2);
        assert_eq!(summary.reports_failed, 1);
        assert_eq!(summary.ids_learned, 3);
        assert!((summary.report_success_rate - 66.666).abs() < 0.01);
        assert_eq!(summary.error_counts.get("status"), Some(&1));
        assert!(summary.latency_max_us >= 2_500);
    }

    #[test]
    fn test_session_counters() {
        let metrics = FleetMetrics::new();
        metrics.record_launch();
        metrics.record_launch();
        metrics.record_registered();
        metrics.record_session_failure("decode");
        metrics.record_traffic(100, 20);

        let summary = metrics.summary();
        assert_eq!(summary.sessions_launched, 2);
        assert_eq!(summary.sessions_registered, 1);
        assert_eq!(summary.sessions_failed, 1);
        assert_eq!(summary.bytes_sent, 100);
        assert_eq!(summary.bytes_received, 20);
        assert_eq!(summary.report_success_rate, 0.0);
    }
}
