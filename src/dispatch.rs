//! Orchestrator: one target monitor per target, all sharing one stop signal.

use anyhow::bail;
use tokio::spawn;
use tracing::{debug, error, instrument};

use crate::monitors::{LoopSettings, TargetContext, TargetMonitor, TargetReport};
use crate::stop::StopSignal;

/// Runs every target to completion and returns their reports in target
/// order. Monitors that exit early have already printed their results.
#[instrument(skip_all, fields(targets = targets.len()))]
pub async fn dispatch_targets(
    targets: &[String],
    settings: LoopSettings,
    ctx: &TargetContext,
    stop: &StopSignal,
) -> anyhow::Result<Vec<TargetReport>> {
    if targets.is_empty() {
        bail!("no destinations to test");
    }

    let mut handles = vec![];
    for target in targets {
        let monitor = TargetMonitor::new(target.clone(), settings, ctx.clone(), stop.clone());
        handles.push(spawn(monitor.run()));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => error!("{e}"),
        }
    }

    debug!("all {} target monitors finished", reports.len());
    Ok(reports)
}
