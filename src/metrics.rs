use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing routing activity.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    events_routed: AtomicU64,
    lines_written: AtomicU64,
    bytes_written: AtomicU64,
    dropped_internal: AtomicU64,
    dropped_no_domain: AtomicU64,
    dropped_cache_full: AtomicU64,
    dropped_closed: AtomicU64,
    open_failures: AtomicU64,
    write_failures: AtomicU64,
    reopens: AtomicU64,
}

impl RouterMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event that resolved to a domain.
    pub fn record_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a line appended to a domain file, and whether the handle was reopened first.
    pub fn record_line(&self, bytes: u64, reopened: bool) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        if reopened {
            self.reopens.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an event skipped by the anti-recursion filter.
    pub fn record_internal(&self) {
        self.dropped_internal.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event without a resolvable domain.
    pub fn record_no_domain(&self) {
        self.dropped_no_domain.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event rejected because the cache is at capacity.
    pub fn record_cache_full(&self) {
        self.dropped_cache_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event that arrived after the cache was drained.
    pub fn record_closed(&self) {
        self.dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failure to open a new domain file.
    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a line lost after the reopen-retry protocol gave up.
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_routed: self.events_routed.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            dropped_internal: self.dropped_internal.load(Ordering::Relaxed),
            dropped_no_domain: self.dropped_no_domain.load(Ordering::Relaxed),
            dropped_cache_full: self.dropped_cache_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            reopens: self.reopens.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of routing counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Events that resolved to a domain.
    pub events_routed: u64,
    /// Lines appended to domain files.
    pub lines_written: u64,
    /// Bytes appended to domain files.
    pub bytes_written: u64,
    /// Events skipped because they came from this crate.
    pub dropped_internal: u64,
    /// Events without a domain.
    pub dropped_no_domain: u64,
    /// Events for new domains rejected by a full cache.
    pub dropped_cache_full: u64,
    /// Events that arrived after shutdown drained the cache.
    pub dropped_closed: u64,
    /// Domain files that could not be created.
    pub open_failures: u64,
    /// Lines lost after a failed reopen or retry.
    pub write_failures: u64,
    /// Writes that needed a reopen before succeeding.
    pub reopens: u64,
}
