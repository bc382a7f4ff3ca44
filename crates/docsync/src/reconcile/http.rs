//! HTTP client for the hook endpoints

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::PlatformApi;
use crate::auth::HEADER_API_KEY;
use crate::models::{FingerprintResponse, LockStatus, SyncResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPlatformClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn hook_url(&self, path: &str) -> String {
        format!("{}/api/hook/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> anyhow::Result<T> {
        let response = request
            .header(HEADER_API_KEY, &self.api_key)
            .send()
            .await
            .context("Platform unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, error_text);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse response")
    }
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    async fn lock_status(&self, project_id: &str) -> anyhow::Result<LockStatus> {
        let url = self.hook_url(&format!("status/{project_id}"));
        self.send(self.client.get(url)).await
    }

    async fn fingerprint(&self, project_id: &str) -> anyhow::Result<FingerprintResponse> {
        let url = self.hook_url(&format!("docs/{project_id}"));
        self.send(self.client.get(url)).await
    }

    async fn full_sync(&self, project_id: &str) -> anyhow::Result<SyncResponse> {
        let url = self.hook_url(&format!("sync/{project_id}"));
        self.send(self.client.post(url)).await
    }
}
