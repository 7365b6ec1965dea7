//! Shared Bright Data request-API client.
//!
//! All three tools go through the same `/request` endpoint with a zone and
//! a target URL; only the zone and timeout differ. Each call carries its
//! own timeout so a stuck backend cannot pin a run.

use std::time::Duration;
use webhound_config::BrightDataConfig;

/// Timeout for SERP searches.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for page scrapes.
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for file downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

/// A thin client over the Bright Data request API.
pub struct BrightDataClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    serp_zone: String,
    unlocker_zone: String,
}

impl BrightDataClient {
    pub fn new(config: &BrightDataConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            token: config.api_token.clone().unwrap_or_default(),
            serp_zone: config.serp_zone.clone(),
            unlocker_zone: config.web_unlocker_zone.clone(),
        }
    }

    async fn request(
        &self,
        zone: &str,
        target_url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let payload = serde_json::json!({
            "zone": zone,
            "url": target_url,
            "format": "raw",
        });

        let response = self
            .http
            .post(&self.api_base)
            .timeout(timeout)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        response.error_for_status()
    }

    /// Run a SERP query through the search zone.
    pub async fn serp(&self, target_url: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.request(&self.serp_zone, target_url, SEARCH_TIMEOUT)
            .await
    }

    /// Fetch a page through the Web Unlocker zone.
    pub async fn unlock(
        &self,
        target_url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.request(&self.unlocker_zone, target_url, timeout).await
    }
}
