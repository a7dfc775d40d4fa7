use std::time::Duration;

const DEFAULT_PING_URL: &str = "https://speed.cloudflare.com/__down?bytes=0";
const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down";
const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

/// Remote exerciser endpoints. The download URL receives a `?bytes=` query;
/// the ping URL is used as-is.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub ping_url: String,
    pub download_url: String,
    pub upload_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ping_url: DEFAULT_PING_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of sequential round-trip probes.
    pub probe_count: usize,
    /// Wall-clock budget for the download stage.
    pub download_window: Duration,
    /// Wall-clock budget for the upload stage.
    pub upload_window: Duration,
    /// Requested stream length; must comfortably outlive `download_window`.
    pub stream_floor_bytes: u64,
    /// Size of the reusable upload payload.
    pub upload_chunk_bytes: usize,
    /// Skip the upload stage entirely when false.
    pub run_upload: bool,
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe_count: 5,
            download_window: Duration::from_secs(10),
            upload_window: Duration::from_secs(8),
            stream_floor_bytes: 150 * 1024 * 1024,
            upload_chunk_bytes: 2 * 1024 * 1024,
            run_upload: true,
            endpoints: Endpoints::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ProbeCount,
    DownloadWindow,
    UploadWindow,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            SettingsField::ProbeCount => SettingsField::DownloadWindow,
            SettingsField::DownloadWindow => SettingsField::UploadWindow,
            SettingsField::UploadWindow => SettingsField::ProbeCount,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SettingsField::ProbeCount => SettingsField::UploadWindow,
            SettingsField::DownloadWindow => SettingsField::ProbeCount,
            SettingsField::UploadWindow => SettingsField::DownloadWindow,
        }
    }
}

impl Settings {
    pub fn increase(&mut self, field: SettingsField) {
        match field {
            SettingsField::ProbeCount => {
                self.probe_count = (self.probe_count + 1).min(20);
            }
            SettingsField::DownloadWindow => {
                self.download_window = (self.download_window + Duration::from_secs(1))
                    .min(Duration::from_secs(30));
            }
            SettingsField::UploadWindow => {
                self.upload_window =
                    (self.upload_window + Duration::from_secs(1)).min(Duration::from_secs(30));
            }
        }
    }

    pub fn decrease(&mut self, field: SettingsField) {
        match field {
            SettingsField::ProbeCount => {
                self.probe_count = self.probe_count.saturating_sub(1).max(1);
            }
            SettingsField::DownloadWindow => {
                self.download_window = self
                    .download_window
                    .saturating_sub(Duration::from_secs(1))
                    .max(Duration::from_secs(1));
            }
            SettingsField::UploadWindow => {
                self.upload_window = self
                    .upload_window
                    .saturating_sub(Duration::from_secs(1))
                    .max(Duration::from_secs(1));
            }
        }
    }
}
