pub mod download;
pub mod ping;
pub mod sampler;
pub mod upload;

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use reqwest::Client;
use tokio::sync::mpsc;

use crate::settings::Settings;
use download::DownloadTest;
use ping::PingTest;
use upload::UploadTest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPhase {
    #[default]
    Idle,
    Ping,
    Download,
    Upload,
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct SpeedTestResult {
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// Stamped once, when the run finalizes. A failed run never gets one.
    pub completed_at: Option<SystemTime>,
}

/// Everything a run can tell its caller, in emission order. Progress events
/// may be dropped when the consumer lags; completion events and `RunFailed`
/// never are.
#[derive(Debug, Clone)]
pub enum TestUpdate {
    PingComplete { avg_ms: f64, jitter_ms: f64 },
    DownloadProgress { mbps: f64 },
    DownloadComplete { mbps: f64 },
    UploadProgress { mbps: f64 },
    UploadComplete { mbps: f64 },
    RunFailed { reason: String },
}

/// Only the download stage can produce one of these; every other stage
/// absorbs its failures.
#[derive(Debug, thiserror::Error)]
pub enum SpeedTestError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("measurement task stopped unexpectedly")]
    TaskAborted,
}

/// Orchestrates ping, download, and upload in order and owns the result
/// accumulator. Runners hand their numbers back over channels; nothing else
/// writes to the result.
pub struct SpeedTest {
    client: Client,
    phase: Arc<Mutex<TestPhase>>,
    results: Arc<Mutex<Option<SpeedTestResult>>>,
}

impl SpeedTest {
    pub fn new() -> Result<Self, SpeedTestError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            phase: Arc::new(Mutex::new(TestPhase::Idle)),
            results: Arc::new(Mutex::new(None)),
        })
    }

    pub fn phase(&self) -> TestPhase {
        *self.phase.lock().unwrap()
    }

    /// The last finalized result, present once a run reaches `Complete`.
    pub fn results(&self) -> Option<SpeedTestResult> {
        self.results.lock().unwrap().clone()
    }

    /// Begin a run and return its event stream. A run may only start from
    /// `Idle` or `Complete`; calling this mid-run is a no-op returning
    /// `None`, leaving the run in flight untouched.
    pub fn start(&self, settings: &Settings) -> Option<mpsc::Receiver<TestUpdate>> {
        {
            let mut phase = self.phase.lock().unwrap();
            if !matches!(*phase, TestPhase::Idle | TestPhase::Complete) {
                return None;
            }
            *phase = TestPhase::Ping;
        }
        *self.results.lock().unwrap() = None;

        let (update_tx, update_rx) = mpsc::channel(64);
        tokio::spawn(run_stages(
            self.client.clone(),
            settings.clone(),
            Arc::clone(&self.phase),
            Arc::clone(&self.results),
            update_tx,
        ));
        Some(update_rx)
    }
}

async fn run_stages(
    client: Client,
    settings: Settings,
    phase: Arc<Mutex<TestPhase>>,
    published: Arc<Mutex<Option<SpeedTestResult>>>,
    update_tx: mpsc::Sender<TestUpdate>,
) {
    let mut results = SpeedTestResult::default();

    // Ping reports once, after all probes; there is no incremental feed.
    let probe = PingTest::new(settings.endpoints.ping_url.clone(), settings.probe_count);
    let ping = probe.run(&client).await;
    results.ping_ms = ping.avg_ms;
    results.jitter_ms = ping.jitter_ms;
    set_phase(&phase, TestPhase::Download);
    let _ = update_tx
        .send(TestUpdate::PingComplete {
            avg_ms: ping.avg_ms,
            jitter_ms: ping.jitter_ms,
        })
        .await;

    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let test = DownloadTest::new(
        settings.endpoints.download_url.clone(),
        settings.download_window,
        settings.stream_floor_bytes,
    );
    let download_client = client.clone();
    let handle = tokio::spawn(async move { test.run(&download_client, &progress_tx).await });
    while let Some(mbps) = progress_rx.recv().await {
        results.download_mbps = mbps;
        let _ = update_tx.try_send(TestUpdate::DownloadProgress { mbps });
    }
    let download_mbps = match handle.await {
        Ok(Ok(mbps)) => mbps,
        Ok(Err(err)) => return fail_run(&phase, &update_tx, err).await,
        Err(err) => {
            tracing::error!(%err, "download task aborted");
            return fail_run(&phase, &update_tx, SpeedTestError::TaskAborted).await;
        }
    };
    results.download_mbps = download_mbps;

    if !settings.run_upload {
        let _ = update_tx
            .send(TestUpdate::DownloadComplete {
                mbps: download_mbps,
            })
            .await;
        finalize(&phase, &published, results);
        return;
    }

    set_phase(&phase, TestPhase::Upload);
    let _ = update_tx
        .send(TestUpdate::DownloadComplete {
            mbps: download_mbps,
        })
        .await;

    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let test = UploadTest::new(
        settings.endpoints.upload_url.clone(),
        settings.upload_window,
        settings.upload_chunk_bytes,
    );
    let upload_client = client.clone();
    let handle = tokio::spawn(async move { test.run(&upload_client, progress_tx).await });
    while let Some(mbps) = progress_rx.recv().await {
        results.upload_mbps = mbps;
        let _ = update_tx.try_send(TestUpdate::UploadProgress { mbps });
    }
    // A panicked upload task degrades to zero like any other upload failure.
    let upload_mbps = handle.await.unwrap_or(0.0);
    results.upload_mbps = upload_mbps;

    finalize(&phase, &published, results);
    let _ = update_tx
        .send(TestUpdate::UploadComplete { mbps: upload_mbps })
        .await;
}

fn set_phase(phase: &Arc<Mutex<TestPhase>>, next: TestPhase) {
    tracing::debug!(?next, "stage transition");
    *phase.lock().unwrap() = next;
}

fn finalize(
    phase: &Arc<Mutex<TestPhase>>,
    published: &Arc<Mutex<Option<SpeedTestResult>>>,
    mut results: SpeedTestResult,
) {
    results.completed_at = Some(SystemTime::now());
    *published.lock().unwrap() = Some(results);
    set_phase(phase, TestPhase::Complete);
}

async fn fail_run(
    phase: &Arc<Mutex<TestPhase>>,
    update_tx: &mpsc::Sender<TestUpdate>,
    err: SpeedTestError,
) {
    tracing::warn!(%err, "run aborted during download stage");
    set_phase(phase, TestPhase::Idle);
    let _ = update_tx
        .send(TestUpdate::RunFailed {
            reason: err.to_string(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Endpoints;

    fn unreachable_settings() -> Settings {
        // Nothing listens on the discard port; every request fails fast.
        let endpoints = Endpoints {
            ping_url: "http://127.0.0.1:9/ping".to_string(),
            download_url: "http://127.0.0.1:9/down".to_string(),
            upload_url: "http://127.0.0.1:9/up".to_string(),
        };
        Settings {
            probe_count: 1,
            endpoints,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn start_mid_run_is_a_noop() {
        let test = SpeedTest::new().unwrap();
        let settings = unreachable_settings();

        let mut rx = test.start(&settings).expect("idle engine accepts a run");
        // The phase flipped to Ping synchronously, so this must be refused.
        assert!(test.start(&settings).is_none());

        let mut saw_failure = false;
        while let Some(update) = rx.recv().await {
            if matches!(update, TestUpdate::RunFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure, "unreachable download endpoint must fail the run");
        assert_eq!(test.phase(), TestPhase::Idle);
        assert!(test.results().is_none());

        // Back at idle, a new run is accepted again.
        assert!(test.start(&settings).is_some());
    }
}
