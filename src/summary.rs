//! Summary Aggregator
//!
//! A [`RunningSummary`] belongs to exactly one target monitor. It is created
//! from the first successful sample, grows additively with every further
//! sample and is consumed by [`RunningSummary::finalize`], so it cannot be
//! touched after its report has been produced.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{TimingSample, msec};

#[derive(Debug, Clone)]
pub struct RunningSummary {
    target: String,
    count: u64,
    first_start: DateTime<Utc>,
    dns: Duration,
    tcp: Duration,
    tls: Duration,
    reply: Duration,
    close: Duration,
    total: Duration,
    size: u64,
    /// Raw per status label counts, e.g. `"200" -> 41, "0" -> 1`
    statuses: BTreeMap<String, u64>,
    /// Raw per remote peer counts
    remotes: BTreeMap<String, u64>,
}

/// Finalized averages for one target, all durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub target: String,
    pub count: u64,
    pub elapsed_secs: u64,
    pub dns_ms: f64,
    pub tcp_ms: f64,
    pub tls_ms: f64,
    pub reply_ms: f64,
    pub close_ms: f64,
    pub response_ms: f64,
    pub size: f64,
    pub statuses: BTreeMap<String, u64>,
    pub remotes: BTreeMap<String, u64>,
}

impl RunningSummary {
    pub fn start(sample: &TimingSample) -> Self {
        let mut summary = Self {
            target: sample.target.clone(),
            count: 0,
            first_start: sample.start,
            dns: Duration::ZERO,
            tcp: Duration::ZERO,
            tls: Duration::ZERO,
            reply: Duration::ZERO,
            close: Duration::ZERO,
            total: Duration::ZERO,
            size: 0,
            statuses: BTreeMap::new(),
            remotes: BTreeMap::new(),
        };
        summary.add(sample);
        summary
    }

    pub fn add(&mut self, sample: &TimingSample) {
        self.count += 1;
        self.dns += sample.dns;
        self.tcp += sample.tcp;
        self.tls += sample.tls;
        self.reply += sample.reply;
        self.close += sample.close;
        self.total += sample.total;
        self.size += sample.size;

        *self.statuses.entry(sample.status_label()).or_default() += 1;
        if let Some(remote) = &sample.remote {
            *self.remotes.entry(remote.clone()).or_default() += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn first_start(&self) -> DateTime<Utc> {
        self.first_start
    }

    /// Divides every accumulated field by the sample count captured now.
    pub fn finalize(self, now: DateTime<Utc>) -> SummaryReport {
        // count is at least one, `start` always records its sample
        let count = self.count.max(1) as f64;
        let elapsed_secs = (now - self.first_start).num_seconds().max(0) as u64;

        SummaryReport {
            target: self.target,
            count: self.count,
            elapsed_secs,
            dns_ms: msec(self.dns) / count,
            tcp_ms: msec(self.tcp) / count,
            tls_ms: msec(self.tls) / count,
            reply_ms: msec(self.reply) / count,
            close_ms: msec(self.close) / count,
            response_ms: msec(self.total) / count,
            size: self.size as f64 / count,
            statuses: self.statuses,
            remotes: self.remotes,
        }
    }
}
