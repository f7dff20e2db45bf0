//! Target Probe Loop
//!
//! ```text
//!   probe ──ok──▶ record (summary, output, sinks, alert) ─┐
//!     │                                                   ▼
//!     └─err──▶ failures += 1 ── ceiling? ──yes──▶ exit   done? ──yes──▶ exit
//!                                 │ no                    │ no
//!                                 ▼                       ▼
//!                         select { stop closed ▶ exit, delay elapsed ▶ probe }
//! ```
//!
//! Whatever the exit path, [`TargetMonitor::run`] finalizes the summary once
//! if at least one sample succeeded.

use chrono::Utc;
use tracing::{debug, error, instrument, trace, warn};

use crate::monitors::{LoopSettings, TargetContext};
use crate::stop::StopSignal;
use crate::summary::{RunningSummary, SummaryReport};
use crate::{TimingSample, msec};

/// Upper bound standing in for "until stopped" when attempts is 0.
pub const UNBOUNDED_ATTEMPTS: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Requested number of samples recorded
    Completed,
    /// Too many failed attempts
    FailureCeiling,
    /// Stop signal closed during a delay
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub successes: u64,
    pub failures: u32,
    pub exit: ExitReason,
    pub summary: Option<SummaryReport>,
}

pub struct TargetMonitor {
    target: String,
    settings: LoopSettings,
    ctx: TargetContext,
    stop: StopSignal,
    successes: u64,
    failures: u32,
    summary: Option<RunningSummary>,
}

impl TargetMonitor {
    pub fn new(
        target: impl Into<String>,
        settings: LoopSettings,
        ctx: TargetContext,
        stop: StopSignal,
    ) -> Self {
        Self {
            target: target.into(),
            settings,
            ctx,
            stop,
            successes: 0,
            failures: 0,
            summary: None,
        }
    }

    fn max_attempts(&self) -> u64 {
        match self.settings.max_attempts {
            0 => UNBOUNDED_ATTEMPTS,
            n => n,
        }
    }

    #[instrument(skip(self), fields(url = %self.target))]
    pub async fn run(mut self) -> TargetReport {
        debug!(
            "starting target monitor with delay {:?}, {} attempts, {} failures allowed",
            self.settings.delay, self.settings.max_attempts, self.settings.max_failures
        );

        let exit = self.probe_until_exit().await;
        self.finish(exit)
    }

    async fn probe_until_exit(&mut self) -> ExitReason {
        let max_attempts = self.max_attempts();

        loop {
            match self.ctx.probe.probe(&self.target).await {
                Ok(sample) => {
                    self.successes += 1;
                    self.record(sample).await;
                    if self.successes >= max_attempts {
                        return ExitReason::Completed;
                    }
                }
                Err(e) => {
                    self.failures += 1;
                    warn!("{}: {e}", self.target);
                    if self.failures >= self.settings.max_failures {
                        warn!(
                            "{}: giving up after {} failed attempts",
                            self.target, self.failures
                        );
                        return ExitReason::FailureCeiling;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.stop.closed() => {
                    debug!("stop signal received");
                    return ExitReason::Stopped;
                }
                _ = tokio::time::sleep(self.settings.delay) => {}
            }
        }
    }

    async fn record(&mut self, sample: TimingSample) {
        match self.summary.as_mut() {
            Some(summary) => summary.add(&sample),
            None => self.summary = Some(RunningSummary::start(&sample)),
        }
        self.ctx.reporter.sample(self.successes, &sample);

        if let Some(metrics) = &self.ctx.metrics {
            if let Err(e) = metrics
                .publish(
                    &self.ctx.location,
                    &sample.target,
                    &sample.status_label(),
                    msec(sample.response_time()),
                )
                .await
            {
                error!("failed to publish metrics for {}: {e:#}", self.target);
            }
        }

        if let Some(webhook) = &self.ctx.webhook {
            if let Err(e) = webhook.publish(&sample).await {
                error!("failed to publish sample for {}: {e:#}", self.target);
            }
        }

        if self.ctx.alerts.exceeds_threshold(&sample) {
            let outcome = self.ctx.alerts.consider(&sample, &self.target).await;
            trace!("alert outcome: {outcome:?}");
        }
    }

    fn finish(self, exit: ExitReason) -> TargetReport {
        let summary = match self.summary {
            Some(summary) => {
                let report = summary.finalize(Utc::now());
                self.ctx.reporter.summary(&report);
                Some(report)
            }
            None => {
                if exit == ExitReason::FailureCeiling {
                    self.ctx.reporter.no_samples(&self.target);
                }
                None
            }
        };

        debug!(
            "target monitor finished: {exit:?}, {} successes, {} failures",
            self.successes, self.failures
        );

        TargetReport {
            target: self.target,
            successes: self.successes,
            failures: self.failures,
            exit,
            summary,
        }
    }
}
