use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::sink_client;
use crate::alerts::Notifier;
use crate::config::TwilioCredentials;

const TWILIO_API: &str = "https://api.twilio.com";
const TWILIO_TIMEOUT: Duration = Duration::from_secs(10);
const TWILIO_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

/// Sends alert text as SMS through the Twilio Messages API.
#[derive(Debug, Clone)]
pub struct TwilioNotifier {
    client: reqwest::Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioNotifier {
    pub fn new(credentials: TwilioCredentials) -> Result<Self> {
        Ok(Self {
            client: sink_client(TWILIO_TIMEOUT, TWILIO_CONNECT_TIMEOUT)?,
            credentials,
            base_url: TWILIO_API.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &str, recipient: &str) -> Result<()> {
        debug!("sending Twilio message to {recipient}");

        let form = [
            ("To", recipient),
            ("From", self.credentials.sender.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .context("Twilio request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Twilio HTTP error {status}: {body}");
        }

        let message: MessageResponse = response
            .json()
            .await
            .context("failed to decode Twilio response")?;
        info!(
            "Twilio accepted message {}",
            message.sid.as_deref().unwrap_or("<no sid>")
        );

        Ok(())
    }
}
