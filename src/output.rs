//! Program output: per-sample lines and per-target summaries on stdout.
//!
//! Output from different targets may interleave, but a single line or block
//! is always written under one lock.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::summary::SummaryReport;
use crate::util::hhmmss;
use crate::{TimingSample, msec};

const TEXT_HEADER: &str =
    "#\tStart\tDNS\tTCP\tTLS\tReply\tClose\tRespTime\tCode\tSize\tRemote\tURL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab separated text, one line per sample
    #[default]
    Text,
    /// Indented JSON records
    Json,
}

pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

#[derive(Clone)]
pub struct Reporter {
    format: OutputFormat,
    writer: SharedWriter,
}

impl Reporter {
    pub fn new(format: OutputFormat, writer: impl Write + Send + 'static) -> Self {
        Self {
            format,
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, std::io::stdout())
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Column header, only printed in text mode.
    pub fn header(&self) {
        if self.format == OutputFormat::Text {
            self.write(format!("{TEXT_HEADER}\n"));
        }
    }

    pub fn sample(&self, count: u64, sample: &TimingSample) {
        let text = match self.format {
            OutputFormat::Text => format!(
                "{count}\t{}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{}\t{}\t{}\t{}\n",
                sample.start.to_rfc3339(),
                msec(sample.dns),
                msec(sample.tcp),
                msec(sample.tls),
                msec(sample.reply),
                msec(sample.close),
                msec(sample.response_time()),
                sample.status_label(),
                sample.size,
                sample.remote.as_deref().unwrap_or("-"),
                sample.target,
            ),
            OutputFormat::Json => match serde_json::to_string_pretty(sample) {
                Ok(json) => format!("{json}\n"),
                Err(e) => {
                    warn!("failed to encode sample: {e}");
                    return;
                }
            },
        };
        self.write(text);
    }

    pub fn summary(&self, report: &SummaryReport) {
        let elapsed = hhmmss(std::time::Duration::from_secs(report.elapsed_secs));
        let text = match self.format {
            OutputFormat::Text => format!(
                "\nRecorded {} samples in {elapsed}, average values:\n{TEXT_HEADER}\n\
                 {}\t{elapsed}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t\t{:.0}\t\t{}\n\n",
                report.count,
                report.count,
                report.dns_ms,
                report.tcp_ms,
                report.tls_ms,
                report.reply_ms,
                report.close_ms,
                report.response_ms,
                report.size,
                report.target,
            ),
            OutputFormat::Json => match serde_json::to_string_pretty(report) {
                Ok(json) => format!("{json}\n"),
                Err(e) => {
                    warn!("failed to encode summary: {e}");
                    return;
                }
            },
        };
        self.write(text);
    }

    pub fn no_samples(&self, target: &str) {
        self.write(format!(
            "No valid samples received from {target}, no summary provided\n"
        ));
    }

    /// Free-form line, e.g. the shutdown acknowledgement.
    pub fn note(&self, line: &str) {
        self.write(format!("{line}\n"));
    }

    fn write(&self, text: String) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
        {
            warn!("failed to write output: {e}");
        }
    }
}
