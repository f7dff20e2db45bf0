//! Target monitors: one independent probe loop per configured target.

pub mod target;

use std::sync::Arc;
use std::time::Duration;

use crate::alerts::AlertManager;
use crate::output::Reporter;
use crate::probe::Probe;
use crate::sinks::{MetricsSink, SampleSink};

pub use target::{ExitReason, TargetMonitor, TargetReport};

/// Collaborators shared by every target monitor. Cheap to clone.
#[derive(Clone)]
pub struct TargetContext {
    pub probe: Arc<dyn Probe>,
    pub reporter: Reporter,
    pub alerts: Arc<AlertManager>,
    pub metrics: Option<Arc<dyn MetricsSink>>,
    pub webhook: Option<Arc<dyn SampleSink>>,
    pub location: String,
}

impl TargetContext {
    pub fn new(probe: Arc<dyn Probe>, reporter: Reporter, alerts: Arc<AlertManager>) -> Self {
        Self {
            probe,
            reporter,
            alerts,
            metrics: None,
            webhook: None,
            location: String::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_webhook(mut self, webhook: Arc<dyn SampleSink>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Successful samples before the loop ends, 0 for unbounded
    pub max_attempts: u64,
    /// Total (not consecutive) failures before the loop gives up
    pub max_failures: u32,
    pub delay: Duration,
}
