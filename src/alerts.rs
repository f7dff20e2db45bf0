//! Alert Manager
//!
//! One instance is shared by every target monitor. The minimum interval
//! between alerts is global: a burst of slow samples across different
//! targets produces at most one notification per interval.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::TimingSample;

/// Notification sink, e.g. SMS.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, recipient: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Response time did not exceed the threshold
    BelowThreshold,
    /// Too soon after the previous alert
    Suppressed,
    /// Alert was due but there is no notifier or no recipient
    Unconfigured,
    Dispatched { delivered: usize, failed: usize },
}

pub struct AlertManager {
    threshold: Option<Duration>,
    min_interval: Duration,
    last_alert: Mutex<Option<DateTime<Utc>>>,
    notifier: Option<Arc<dyn Notifier>>,
    recipients: Vec<String>,
}

impl AlertManager {
    /// `threshold` of `None` disables alerting entirely.
    pub fn new(threshold: Option<Duration>, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            last_alert: Mutex::new(None),
            notifier: None,
            recipients: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, recipients: Vec<String>) -> Self {
        self.notifier = Some(notifier);
        self.recipients = recipients;
        self
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }

    pub fn exceeds_threshold(&self, sample: &TimingSample) -> bool {
        self.threshold
            .is_some_and(|threshold| sample.response_time() > threshold)
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        *self.last_alert.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decides whether `sample` on `target` warrants a notification and
    /// dispatches it to every recipient if so.
    #[instrument(skip_all, fields(url = %target))]
    pub async fn consider(&self, sample: &TimingSample, target: &str) -> AlertOutcome {
        let Some(threshold) = self.threshold else {
            return AlertOutcome::BelowThreshold;
        };
        if sample.response_time() <= threshold {
            return AlertOutcome::BelowThreshold;
        }

        let message = format!(
            "RespTime {:?} on {target} exceeds {threshold:?}",
            sample.response_time()
        );
        info!("{message}");

        if !self.claim(sample.start) {
            debug!("too soon to send another alert");
            return AlertOutcome::Suppressed;
        }

        let Some(notifier) = self.notifier.as_ref().filter(|_| !self.recipients.is_empty()) else {
            warn!("nowhere to send notification for {target}");
            return AlertOutcome::Unconfigured;
        };

        let results = join_all(
            self.recipients
                .iter()
                .map(|recipient| notifier.send(&message, recipient)),
        )
        .await;

        let mut failed = 0;
        for (recipient, result) in self.recipients.iter().zip(results) {
            if let Err(e) = result {
                error!("failed to notify {recipient}: {e:#}");
                failed += 1;
            }
        }

        AlertOutcome::Dispatched {
            delivered: self.recipients.len() - failed,
            failed,
        }
    }

    /// Check-and-update of the global last alert time, under one lock so two
    /// monitors can never both pass the interval check.
    fn claim(&self, at: DateTime<Utc>) -> bool {
        let mut last_alert = self.last_alert.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = *last_alert {
            // whole seconds, like the interval itself
            let since = at.timestamp() - previous.timestamp();
            let interval = i64::try_from(self.min_interval.as_secs()).unwrap_or(i64::MAX);
            if since < interval {
                return false;
            }
        }
        *last_alert = Some(at);
        true
    }
}
