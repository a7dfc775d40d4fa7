use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cumulative throughput in Mbps: total bits over total elapsed seconds.
/// Returns 0 while no time has passed, so the first sample of a stage can
/// never divide by zero.
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// Running byte counter anchored to the start of a stage.
///
/// The reported rate is a cumulative average, not a sliding window: slow
/// ramp-up samples keep dragging the figure until elapsed time dominates
/// them. Both runners rely on that convergence behavior.
#[derive(Debug)]
pub struct RateMeter {
    start: Instant,
    total_bytes: AtomicU64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            total_bytes: AtomicU64::new(0),
        }
    }

    /// Add `delta` bytes and return the cumulative rate so far.
    pub fn record(&self, delta: u64) -> f64 {
        let total = self.total_bytes.fetch_add(delta, Ordering::Relaxed) + delta;
        mbps(total, self.start.elapsed())
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_elapsed_yields_zero_rate() {
        assert_eq!(mbps(1_000_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn sustained_transfer_reports_bit_rate() {
        // 12.5 MB/s for 10 s is 100 Mbps.
        let rate = mbps(12_500_000 * 10, Duration::from_secs(10));
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn meter_accumulates_across_records() {
        let meter = RateMeter::starting_at(Instant::now() - Duration::from_secs(10));
        meter.record(6_250_000 * 10);
        let rate = meter.record(6_250_000 * 10);
        // 12.5 MB over ~10 s; allow slack for the time spent in the test.
        assert!((rate - 100.0).abs() < 1.0, "rate was {rate}");
        assert_eq!(meter.total_bytes(), 125_000_000);
    }

    #[test]
    fn startup_gap_drags_cumulative_average() {
        // Nothing transferred during the first of ten seconds: the average
        // must sit strictly below the steady 100 Mbps.
        let meter = RateMeter::starting_at(Instant::now() - Duration::from_secs(10));
        let rate = meter.record(12_500_000 * 9);
        assert!(rate < 100.0);
        assert!(rate > 80.0);
    }
}
