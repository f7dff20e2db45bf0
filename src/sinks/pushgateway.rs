use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{instrument, trace};

use super::{MetricsSink, sink_client};

const RESPONSE_TIME_METRIC: &str = "perfprobe_response_time_ms";
const JOB: &str = "perfprobe";
const LOCATION_LABEL: &str = "location";
const TARGET_LABEL: &str = "target";
const CODE_LABEL: &str = "code";

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);
const PUSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pushes response times to a Prometheus Pushgateway in text exposition
/// format, one gauge per (location, target, code).
#[derive(Debug, Clone)]
pub struct PushgatewaySink {
    client: reqwest::Client,
    endpoint: String,
}

impl PushgatewaySink {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: sink_client(PUSH_TIMEOUT, PUSH_CONNECT_TIMEOUT)?,
            endpoint: format!("{}/metrics/job/{JOB}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Renders a single gauge sample.
pub fn render_response_time(location: &str, target: &str, status_code: &str, value: f64) -> String {
    format!(
        "# TYPE {RESPONSE_TIME_METRIC} gauge\n\
         {RESPONSE_TIME_METRIC}{{{LOCATION_LABEL}=\"{}\",{TARGET_LABEL}=\"{}\",{CODE_LABEL}=\"{}\"}} {value}\n",
        escape_label(location),
        escape_label(target),
        escape_label(status_code),
    )
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[async_trait]
impl MetricsSink for PushgatewaySink {
    #[instrument(skip(self, location, target), fields(url = %target))]
    async fn publish(
        &self,
        location: &str,
        target: &str,
        status_code: &str,
        response_time_ms: f64,
    ) -> Result<()> {
        trace!("publishing {response_time_ms} msec to pushgateway");

        // POST replaces only metrics with the same name within the group
        self.client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(render_response_time(
                location,
                target,
                status_code,
                response_time_ms,
            ))
            .send()
            .await
            .context("pushgateway request failed")?
            .error_for_status()
            .context("pushgateway rejected metrics")?;

        Ok(())
    }
}
