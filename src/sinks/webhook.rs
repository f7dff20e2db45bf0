use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{SampleSink, sink_client};
use crate::TimingSample;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const WEBHOOK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts every sample as JSON to an HTTPS endpoint.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("https://") {
            bail!("webhook URL must start with https://, got {url}");
        }
        Self::with_client(url, sink_client(WEBHOOK_TIMEOUT, WEBHOOK_CONNECT_TIMEOUT)?)
    }

    /// Skips the scheme check; used against local endpoints.
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SampleSink for WebhookSink {
    #[instrument(skip(self, sample), fields(url = %sample.target))]
    async fn publish(&self, sample: &TimingSample) -> Result<()> {
        debug!("publishing {:?} to webhook", sample.remote);

        let response = self
            .client
            .post(&self.url)
            .json(sample)
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected sample")?;

        // drain so the connection can be reused
        response.bytes().await.context("failed to read webhook response")?;
        Ok(())
    }
}
