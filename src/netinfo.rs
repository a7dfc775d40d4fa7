use std::time::Duration;

use serde::Deserialize;

const LOOKUP_URL: &str = "https://ipapi.co/json/";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public-IP and ISP details shown in the header. Informational only; the
/// measurement run never depends on it.
#[derive(Debug, Clone, Deserialize)]
pub struct IpInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub region: String,
}

impl IpInfo {
    pub fn placeholder() -> Self {
        Self {
            ip: "...".to_string(),
            org: "Detecting ISP...".to_string(),
            city: "Unknown Location".to_string(),
            country_name: String::new(),
            region: String::new(),
        }
    }

    /// "City, Region, Country" with empty parts skipped.
    pub fn location_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in [&self.city, &self.region, &self.country_name] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        parts.join(", ")
    }
}

/// Look up the caller's network details, degrading to a placeholder on any
/// failure. There is no error surface here.
pub async fn fetch_ip_info() -> IpInfo {
    match try_fetch().await {
        Ok(info) => info,
        Err(err) => {
            tracing::debug!(%err, "network info lookup failed, using placeholder");
            IpInfo::placeholder()
        }
    }
}

async fn try_fetch() -> Result<IpInfo, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()?;
    client
        .get(LOOKUP_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}
