use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::sampler::{mbps, RateMeter};

/// The payload is filled (and later streamed out) in increments of this
/// size, mirroring per-call limits on platform random sources.
const FILL_STEP: usize = 64 * 1024;

/// Measures sustained upload throughput by posting one reusable random
/// payload until the window closes.
///
/// Byte accounting only advances when an iteration completes: a request
/// aborted at the deadline contributes nothing to the completed total even
/// though some of its bytes went out. Request failures end the stage
/// silently; this runner never fails the run.
pub struct UploadTest {
    url: String,
    window: Duration,
    payload: Bytes,
}

impl UploadTest {
    pub fn new(url: String, window: Duration, payload_bytes: usize) -> Self {
        Self {
            url,
            window,
            payload: random_payload(payload_bytes),
        }
    }

    pub async fn run(&self, client: &Client, progress_tx: mpsc::Sender<f64>) -> f64 {
        let start = Instant::now();
        let deadline = start + self.window;
        let meter = Arc::new(RateMeter::new());
        let mut completed: u64 = 0;

        while Instant::now() < deadline {
            let body = reqwest::Body::wrap_stream(payload_stream(
                self.payload.clone(),
                Arc::clone(&meter),
                progress_tx.clone(),
            ));
            let request = client.post(&self.url).body(body).send();

            match tokio::time::timeout_at(deadline, request).await {
                Ok(Ok(_response)) => {
                    completed += self.payload.len() as u64;
                }
                Ok(Err(err)) => {
                    tracing::debug!(%err, "upload request failed, stopping stage");
                    break;
                }
                Err(_) => {
                    // Deadline hit mid-request: the send future is dropped,
                    // aborting the transfer. In-flight bytes stay uncounted.
                    break;
                }
            }
        }

        let final_rate = mbps(completed, start.elapsed());
        tracing::debug!(
            completed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            final_rate,
            "upload stage finished"
        );
        final_rate
    }
}

/// Streams the payload out in `FILL_STEP` slices, feeding the stage meter
/// and reporting the cumulative rate as each slice is handed to the
/// transport. This is the fine-grained in-flight progress source.
fn payload_stream(
    payload: Bytes,
    meter: Arc<RateMeter>,
    progress_tx: mpsc::Sender<f64>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    futures::stream::unfold(0usize, move |offset| {
        let payload = payload.clone();
        let meter = Arc::clone(&meter);
        let tx = progress_tx.clone();
        async move {
            if offset >= payload.len() {
                return None;
            }
            let end = (offset + FILL_STEP).min(payload.len());
            let piece = payload.slice(offset..end);
            let rate = meter.record(piece.len() as u64);
            if rate > 0.0 {
                let _ = tx.send(rate).await;
            }
            Some((Ok(piece), end))
        }
    })
}

/// One cryptographically random buffer, filled in bounded increments and
/// reused across iterations to avoid repeated allocation and entropy cost.
fn random_payload(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    for chunk in buf.chunks_mut(FILL_STEP) {
        OsRng.fill_bytes(chunk);
    }
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn payload_has_requested_length_and_entropy() {
        // Deliberately not a multiple of the fill step.
        let payload = random_payload(200_000);
        assert_eq!(payload.len(), 200_000);
        assert!(payload.iter().any(|&b| b != 0));
    }

    #[tokio::test]
    async fn payload_stream_yields_every_byte_and_reports_progress() {
        let payload = random_payload(3 * FILL_STEP + 17);
        let meter = Arc::new(RateMeter::starting_at(
            std::time::Instant::now() - Duration::from_secs(1),
        ));
        let (tx, mut rx) = mpsc::channel(64);

        let total: usize = payload_stream(payload.clone(), meter.clone(), tx)
            .map(|piece| piece.unwrap().len())
            .collect::<Vec<_>>()
            .await
            .iter()
            .sum();

        assert_eq!(total, payload.len());
        assert_eq!(meter.total_bytes(), payload.len() as u64);
        assert!(rx.recv().await.is_some());
    }
}
