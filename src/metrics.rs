//! Throughput and outcome statistics for the ingestion loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Processing samples kept for percentile estimates.
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector shared between the ingestion loop and the reporter.
pub struct IngestMetrics {
    /// Payloads pulled off the inbound stream
    pub records_received: AtomicU64,
    /// Records fully committed to the store
    pub records_stored: AtomicU64,
    /// Stored records where at least one field fell back to its default
    pub records_degraded: AtomicU64,
    /// Records skipped after a decode or store failure
    pub records_failed: AtomicU64,
    /// Stored records per classification label
    labels: RwLock<BTreeMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_stored: AtomicU64::new(0),
            records_degraded: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            labels: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed record
    pub fn record_stored(&self, processing_time: Duration, label: &str, degraded: bool) {
        self.records_stored.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.records_degraded.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut labels) = self.labels.write() {
            *labels.entry(label.to_string()).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    pub fn record_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = match self.processing_times.read() {
            Ok(times) => times.clone(),
            Err(_) => return ProcessingStats::default(),
        };
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Records received per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_received.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> IngestSummary {
        IngestSummary {
            received: self.records_received.load(Ordering::Relaxed),
            stored: self.records_stored.load(Ordering::Relaxed),
            degraded: self.records_degraded.load(Ordering::Relaxed),
            failed: self.records_failed.load(Ordering::Relaxed),
            labels: self
                .labels
                .read()
                .map(|labels| labels.clone())
                .unwrap_or_default(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let summary = self.summary();
        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();

        info!("+------------------------------------------------------------+");
        info!("|              INGESTION PIPELINE - SUMMARY                  |");
        info!("+------------------------------------------------------------+");
        info!(
            "| Received: {:>8}  Stored: {:>8}  Throughput: {:>6.1}/s",
            summary.received, summary.stored, throughput
        );
        info!(
            "| Degraded: {:>8}  Failed: {:>8}",
            summary.degraded, summary.failed
        );
        info!(
            "| Processing (us): mean={} p50={} p99={} max={}",
            processing.mean_us, processing.p50_us, processing.p99_us, processing.max_us
        );
        if !summary.labels.is_empty() {
            info!("| Stored by label:");
            for (label, count) in &summary.labels {
                let pct = if summary.stored > 0 {
                    (*count as f64 / summary.stored as f64) * 100.0
                } else {
                    0.0
                };
                info!("|   {:<18} {:>8} ({:>5.1}%)", label, count, pct);
            }
        }
        info!("+------------------------------------------------------------+");
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time counters of the ingestion loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: u64,
    pub stored: u64,
    pub degraded: u64,
    pub failed: u64,
    pub labels: BTreeMap<String, u64>,
}

impl IngestSummary {
    pub fn label(&self, label: &str) -> u64 {
        self.labels.get(label).copied().unwrap_or(0)
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs the metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<IngestMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<IngestMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately; skip the empty report.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = IngestMetrics::new();

        metrics.record_received();
        metrics.record_received();
        metrics.record_received();
        metrics.record_stored(Duration::from_micros(100), "fraud", false);
        metrics.record_stored(Duration::from_micros(300), "legit", true);
        metrics.record_failure();

        let summary = metrics.summary();
        assert_eq!(summary.received, 3);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.label("fraud"), 1);
        assert_eq!(summary.label("missing"), 0);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = IngestMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_stored(Duration::from_micros(us), "humor", false);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_empty_stats() {
        let stats = IngestMetrics::new().get_processing_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean_us, 0);
    }
}
