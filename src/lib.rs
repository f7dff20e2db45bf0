pub mod alerts;
pub mod config;
pub mod dispatch;
pub mod monitors;
pub mod output;
pub mod probe;
pub mod sinks;
pub mod stop;
pub mod summary;
pub mod util;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one successful probe attempt against a target.
///
/// A failed attempt never produces a sample; the probe reports a
/// [`probe::ProbeError`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// Effective target (scheme + host + path)
    pub target: String,

    /// Where the probe ran from
    #[serde(default)]
    pub location: String,

    /// Wall clock time at which the attempt started
    pub start: DateTime<Utc>,

    #[serde(rename = "dns_ms", with = "millis")]
    pub dns: Duration,
    #[serde(rename = "tcp_ms", with = "millis")]
    pub tcp: Duration,
    #[serde(rename = "tls_ms", with = "millis")]
    pub tls: Duration,
    /// Time from sending the request until the response head arrived
    #[serde(rename = "reply_ms", with = "millis")]
    pub reply: Duration,
    /// Time from the response head until the last body byte
    #[serde(rename = "close_ms", with = "millis")]
    pub close: Duration,
    /// Wall time of the whole attempt, never less than the sum of the phases
    #[serde(rename = "total_ms", with = "millis")]
    pub total: Duration,

    /// HTTP status code, `None` when the lower layer produced no status
    pub status: Option<u16>,

    /// Payload size in bytes
    pub size: u64,

    /// Remote peer the request was served by
    pub remote: Option<String>,
}

impl TimingSample {
    pub fn response_time(&self) -> Duration {
        self.total
    }

    pub fn phase_sum(&self) -> Duration {
        self.dns + self.tcp + self.tls + self.reply + self.close
    }

    /// Status code as used for metric labels: zero padded, or `"0"` when
    /// the request produced no status at all.
    pub fn status_label(&self) -> String {
        match self.status {
            Some(code) => format!("{code:03}"),
            None => "0".to_string(),
        }
    }
}

/// Milliseconds as a float, the unit every report is printed in.
pub fn msec(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::msec(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration: {ms}ms")));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}
