use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Push-delivery metrics
#[derive(Debug, Default)]
pub struct PublishMetrics {
    pub attempts: AtomicU64,
    pub delivered: AtomicU64,
    pub retries: AtomicU64,
    pub failures: AtomicU64,
}

impl PublishMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> PublishStats {
        PublishStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Publish metrics: attempts={}, delivered={}, retries={}, failures={}",
            stats.attempts, stats.delivered, stats.retries, stats.failures
        );
    }
}

#[derive(Debug, Clone)]
pub struct PublishStats {
    pub attempts: u64,
    pub delivered: u64,
    pub retries: u64,
    pub failures: u64,
}

/// Global metrics instance
static PUBLISH_METRICS: std::sync::LazyLock<PublishMetrics> =
    std::sync::LazyLock::new(PublishMetrics::new);

pub fn publish_metrics() -> &'static PublishMetrics {
    &PUBLISH_METRICS
}

/// Time an operation and record how long it took
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
