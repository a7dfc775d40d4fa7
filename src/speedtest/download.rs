use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;

use super::sampler::{mbps, RateMeter};
use super::SpeedTestError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Measures sustained download throughput from one long-lived stream.
///
/// The requested byte count is a floor sized to outlive the window, so the
/// stream draining early is not a normal-path concern. Unlike upload, any
/// transport failure here is fatal to the whole run.
pub struct DownloadTest {
    url: String,
    window: Duration,
    stream_floor_bytes: u64,
}

impl DownloadTest {
    pub fn new(url: String, window: Duration, stream_floor_bytes: u64) -> Self {
        Self {
            url,
            window,
            stream_floor_bytes,
        }
    }

    pub async fn run(
        &self,
        client: &Client,
        progress_tx: &mpsc::Sender<f64>,
    ) -> Result<f64, SpeedTestError> {
        let url = format!("{}?bytes={}", self.url, self.stream_floor_bytes);
        let response = client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let meter = RateMeter::new();

        // The deadline is checked between chunks, not by a hard timer; one
        // stalled chunk can overrun the nominal window.
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let rate = meter.record(chunk.len() as u64);
            if rate > 0.0 {
                let _ = progress_tx.send(rate).await;
            }
            if meter.elapsed() > self.window {
                break;
            }
        }
        // Dropping the stream here cancels the remainder of the transfer and
        // releases the connection on every exit path, the error return above
        // included.
        drop(stream);

        let final_rate = mbps(meter.total_bytes(), meter.elapsed());
        tracing::debug!(
            bytes = meter.total_bytes(),
            elapsed_ms = meter.elapsed().as_millis() as u64,
            final_rate,
            "download stage finished"
        );
        Ok(final_rate)
    }
}
