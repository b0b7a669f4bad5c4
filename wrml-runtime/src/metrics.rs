//! Runtime metrics
//!
//! Counters for prototype cache effectiveness and heap traffic. All counters
//! are relaxed atomics; a [`RuntimeMetrics::snapshot`] is consistent per
//! counter, not across counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by the resolver and the heap
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    /// Prototype requests answered from cache
    pub prototype_hits: AtomicU64,

    /// Prototype requests that found no cached prototype
    pub prototype_misses: AtomicU64,

    /// Prototype builds that completed successfully
    pub prototype_builds: AtomicU64,

    /// Total time spent building prototypes (nanoseconds)
    pub total_build_time_ns: AtomicU64,

    pub models_added: AtomicU64,
    pub models_identified: AtomicU64,
    pub models_absorbed: AtomicU64,
    pub models_freed: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.prototype_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.prototype_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished prototype build
    pub fn record_build(&self, duration: Duration) {
        self.prototype_builds.fetch_add(1, Ordering::Relaxed);
        self.total_build_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_added(&self) {
        self.models_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identified(&self) {
        self.models_identified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_absorbed(&self) {
        self.models_absorbed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_freed(&self) {
        self.models_freed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.prototype_hits,
            &self.prototype_misses,
            &self.prototype_builds,
            &self.total_build_time_ns,
            &self.models_added,
            &self.models_identified,
            &self.models_absorbed,
            &self.models_freed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            prototype_hits: self.prototype_hits.load(Ordering::Relaxed),
            prototype_misses: self.prototype_misses.load(Ordering::Relaxed),
            prototype_builds: self.prototype_builds.load(Ordering::Relaxed),
            total_build_time_ns: self.total_build_time_ns.load(Ordering::Relaxed),
            models_added: self.models_added.load(Ordering::Relaxed),
            models_identified: self.models_identified.load(Ordering::Relaxed),
            models_absorbed: self.models_absorbed.load(Ordering::Relaxed),
            models_freed: self.models_freed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`RuntimeMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub prototype_hits: u64,
    pub prototype_misses: u64,
    pub prototype_builds: u64,
    pub total_build_time_ns: u64,
    pub models_added: u64,
    pub models_identified: u64,
    pub models_absorbed: u64,
    pub models_freed: u64,
}

impl MetricsSnapshot {
    /// Prototype cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.prototype_hits + self.prototype_misses;
        if total == 0 {
            0.0
        } else {
            self.prototype_hits as f64 / total as f64
        }
    }

    pub fn avg_build_time(&self) -> Duration {
        if self.prototype_builds == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_build_time_ns / self.prototype_builds)
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Prototypes: {} hits | {} misses | Hit Rate: {:.1}%",
            self.prototype_hits,
            self.prototype_misses,
            self.hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Builds: {} | Avg Build: {:.2}ms",
            self.prototype_builds,
            self.avg_build_time().as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "Models: {} added | {} identified | {} absorbed | {} freed",
            self.models_added, self.models_identified, self.models_absorbed, self.models_freed
        )?;
        Ok(())
    }
}
