//! Delivery destinations for already computed data.
//!
//! Sinks are shared by all target monitors and must be safe for concurrent
//! use. Errors are returned to the caller, which logs and drops them.

pub mod pushgateway;
pub mod twilio;
pub mod webhook;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::TimingSample;

pub use pushgateway::PushgatewaySink;
pub use twilio::TwilioNotifier;
pub use webhook::WebhookSink;

/// Receives one response time per successful sample.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn publish(
        &self,
        location: &str,
        target: &str,
        status_code: &str,
        response_time_ms: f64,
    ) -> Result<()>;
}

/// Receives every successful sample in full.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn publish(&self, sample: &TimingSample) -> Result<()>;
}

/// HTTP client for sinks. Bounded so a slow destination cannot stall a
/// monitor indefinitely.
pub fn sink_client(timeout: Duration, connect_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(10)
        .user_agent(concat!("perfprobe/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}
