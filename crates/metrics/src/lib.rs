use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for depth book synchronization.
#[derive(Debug)]
pub struct SyncMetrics {
    // Counters
    events_received: AtomicU64,
    events_applied: AtomicU64,
    events_stale: AtomicU64,
    events_buffered: AtomicU64,
    snapshots_applied: AtomicU64,
    sequence_gaps: AtomicU64,
    buffer_overflows: AtomicU64,
    decode_errors: AtomicU64,
    transport_errors: AtomicU64,
    resubscribes: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_apply_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            events_stale: AtomicU64::new(0),
            events_buffered: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            sequence_gaps: AtomicU64::new(0),
            buffer_overflows: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            resubscribes: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_apply_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_events_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_events_applied(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.events_applied.fetch_add(count, Ordering::Relaxed);
        self.inner.write().last_apply_time = Some(Instant::now());
    }

    pub fn add_events_stale(&self, count: u64) {
        self.events_stale.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_events_buffered(&self) {
        self.events_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_applied(&self) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_apply_time = Some(Instant::now());
    }

    pub fn inc_sequence_gaps(&self) {
        self.sequence_gaps.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
    }

    pub fn inc_buffer_overflows(&self) {
        self.buffer_overflows.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
    }

    pub fn inc_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
    }

    pub fn inc_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
    }

    pub fn inc_resubscribes(&self) {
        self.resubscribes.fetch_add(1, Ordering::Relaxed);
    }

    fn touch_error(&self) {
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    pub fn events_stale(&self) -> u64 {
        self.events_stale.load(Ordering::Relaxed)
    }

    pub fn events_buffered(&self) -> u64 {
        self.events_buffered.load(Ordering::Relaxed)
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied.load(Ordering::Relaxed)
    }

    pub fn sequence_gaps(&self) -> u64 {
        self.sequence_gaps.load(Ordering::Relaxed)
    }

    pub fn buffer_overflows(&self) -> u64 {
        self.buffer_overflows.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    pub fn resubscribes(&self) -> u64 {
        self.resubscribes.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_apply(&self) -> Option<f64> {
        self.inner
            .read()
            .last_apply_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Applied events per second since start.
    pub fn applies_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            self.events_applied() as f64 / uptime
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received(),
            events_applied: self.events_applied(),
            events_stale: self.events_stale(),
            events_buffered: self.events_buffered(),
            snapshots_applied: self.snapshots_applied(),
            sequence_gaps: self.sequence_gaps(),
            buffer_overflows: self.buffer_overflows(),
            decode_errors: self.decode_errors(),
            transport_errors: self.transport_errors(),
            resubscribes: self.resubscribes(),
            uptime_secs: self.uptime_secs(),
            applies_per_second: self.applies_per_second(),
            secs_since_last_apply: self.secs_since_last_apply(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_applied: u64,
    pub events_stale: u64,
    pub events_buffered: u64,
    pub snapshots_applied: u64,
    pub sequence_gaps: u64,
    pub buffer_overflows: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    pub resubscribes: u64,
    pub uptime_secs: f64,
    pub applies_per_second: f64,
    pub secs_since_last_apply: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health of the synchronized book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Book is receiving and applying updates.
    Healthy,
    /// No update applied recently.
    Degraded,
    /// No update applied for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Seconds without an applied update before the book counts as stale.
    const STALE_THRESHOLD_SECS: f64 = 10.0;
    /// Seconds without an applied update before the book counts as unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 30.0;

    /// Determine the health status based on applied-update recency.
    pub fn health_status(&self) -> HealthStatus {
        // Before the first apply, judge by how long we've been waiting
        let idle_secs = self.secs_since_last_apply.unwrap_or(self.uptime_secs);

        if idle_secs > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if idle_secs > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Total terminal errors across all categories.
    pub fn total_errors(&self) -> u64 {
        self.sequence_gaps + self.buffer_overflows + self.decode_errors + self.transport_errors
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Depth Sync Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Events received:     {}", self.events_received)?;
        writeln!(f, "Events applied:      {}", self.events_applied)?;
        writeln!(f, "Events stale:        {}", self.events_stale)?;
        writeln!(f, "Events buffered:     {}", self.events_buffered)?;
        writeln!(f, "Applies/sec:         {:.2}", self.applies_per_second)?;
        writeln!(f, "Snapshots applied:   {}", self.snapshots_applied)?;
        writeln!(f, "Sequence gaps:       {}", self.sequence_gaps)?;
        writeln!(f, "Buffer overflows:    {}", self.buffer_overflows)?;
        writeln!(f, "Decode errors:       {}", self.decode_errors)?;
        writeln!(f, "Transport errors:    {}", self.transport_errors)?;
        writeln!(f, "Resubscribes:        {}", self.resubscribes)?;
        if let Some(secs) = self.secs_since_last_apply {
            writeln!(f, "Since last apply:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<SyncMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(SyncMetrics::new())
}
