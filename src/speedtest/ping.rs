use std::time::{Duration, Instant};

use reqwest::Client;

/// Latency charged to a probe that errored or timed out. Keeps the
/// statistics well-defined under transient failure at the cost of biasing
/// the average when several probes fall back.
pub const SENTINEL_PENALTY_MS: f64 = 60.0;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct PingResult {
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

/// Sequential round-trip prober. Probes run one at a time so a probe's
/// congestion cannot bleed into the next sample.
pub struct PingTest {
    url: String,
    count: usize,
}

impl PingTest {
    pub fn new(url: String, count: usize) -> Self {
        Self { url, count }
    }

    /// Collect all samples, then summarize. Per-probe failures are absorbed
    /// via the sentinel penalty; this stage never fails.
    pub async fn run(&self, client: &Client) -> PingResult {
        let mut samples = Vec::with_capacity(self.count);

        for i in 0..self.count {
            let start = Instant::now();
            match client
                .get(&self.url)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(_) => samples.push(start.elapsed().as_secs_f64() * 1000.0),
                Err(err) => {
                    tracing::debug!(probe = i, %err, "probe failed, charging sentinel");
                    samples.push(SENTINEL_PENALTY_MS);
                }
            }
        }

        summarize(&samples)
    }
}

/// Mean and range of the collected samples. Jitter here is max minus min,
/// not a standard deviation.
pub fn summarize(samples: &[f64]) -> PingResult {
    if samples.is_empty() {
        return PingResult {
            avg_ms: 0.0,
            jitter_ms: 0.0,
        };
    }

    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let max = samples.iter().cloned().fold(f64::MIN, f64::max);
    let min = samples.iter().cloned().fold(f64::MAX, f64::min);

    PingResult {
        avg_ms: avg,
        jitter_ms: max - min,
    }
}
