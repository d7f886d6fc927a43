//! Request instrumentation hooks

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one dispatched call, as seen by the after-request hook
#[derive(Debug, Clone)]
pub struct RequestReport<'a> {
    pub operation: &'a str,
    /// `SUCCESS,<reply size>` or the failure message
    pub status: &'a str,
    pub success: bool,
    pub elapsed: Duration,
}

/// Seam for timing and SLA collection
///
/// `before_request` fires once when a call is received, `after_request` once
/// when it finishes, whatever the outcome. Both must not block.
pub trait RequestHooks: Send + Sync {
    fn before_request(&self, _operation: &str, _args: &[Bytes]) {}

    fn after_request(&self, _report: &RequestReport<'_>) {}
}

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct RequestStats {
    requests: AtomicU64,
    failures: AtomicU64,
    total_micros: AtomicU64,
}

/// Point-in-time copy of [`RequestStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub failures: u64,
    pub total_latency: Duration,
}

impl RequestStats {
    pub fn record(&self, success: bool, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_latency: Duration::from_micros(self.total_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Default hooks: logs every finished request and keeps counters
pub struct SlaHooks {
    topic: String,
    stats: Option<Arc<RequestStats>>,
}

impl SlaHooks {
    /// `collect_stats = false` keeps logging but skips the counters
    pub fn new(topic: impl Into<String>, collect_stats: bool) -> Self {
        SlaHooks {
            topic: topic.into(),
            stats: collect_stats.then(|| Arc::new(RequestStats::default())),
        }
    }

    pub fn stats(&self) -> Option<Arc<RequestStats>> {
        self.stats.clone()
    }
}

impl RequestHooks for SlaHooks {
    fn before_request(&self, operation: &str, args: &[Bytes]) {
        debug!("[{}] {} received with {} args", self.topic, operation, args.len());
    }

    fn after_request(&self, report: &RequestReport<'_>) {
        if report.success {
            debug!(
                "[{}] {} finished in {:?}: {}",
                self.topic, report.operation, report.elapsed, report.status
            );
        } else {
            warn!(
                "[{}] {} failed after {:?}: {}",
                self.topic, report.operation, report.elapsed, report.status
            );
        }

        if let Some(stats) = &self.stats {
            stats.record(report.success, report.elapsed);
        }
    }
}
