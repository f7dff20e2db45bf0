//! Cooperative shutdown
//!
//! - A stop during the delay ends every monitor without another probe
//! - Summaries are still printed for monitors that recorded samples
//! - Repeated termination requests are acknowledged once

use std::sync::Arc;
use std::time::Duration;

use perfprobe::dispatch::dispatch_targets;
use perfprobe::monitors::ExitReason;
use perfprobe::output::{OutputFormat, Reporter};
use perfprobe::stop::{StopSignal, coordinate_shutdown};
use tokio::sync::mpsc;

use crate::helpers::*;

const TARGETS: [&str; 3] = [
    "https://a.example/",
    "https://b.example/",
    "https://c.example/",
];

fn targets() -> Vec<String> {
    TARGETS.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_stop_during_delay_ends_all_monitors() {
    let probe = Arc::new(
        ScriptedProbe::new()
            .script(TARGETS[0], [ok(10), ok(10)])
            .script(TARGETS[1], [ok(20), ok(20)])
            .script(TARGETS[2], [Step::Fail, Step::Fail]),
    );
    let output = SharedBuffer::default();
    let ctx = context(probe.clone(), &output, no_alerts());
    let stop = StopSignal::new();

    let run = {
        let stop = stop.clone();
        tokio::spawn(async move {
            dispatch_targets(
                &targets(),
                settings(0, 10, Duration::from_secs(3600)),
                &ctx,
                &stop,
            )
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stop.close());

    let reports = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("monitors did not observe the stop signal")
        .unwrap()
        .unwrap();

    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert_eq!(report.exit, ExitReason::Stopped);
    }
    for target in TARGETS {
        assert_eq!(probe.calls(target), 1, "{target} probed after stop");
    }

    assert_eq!(reports[0].summary.as_ref().map(|s| s.count), Some(1));
    assert_eq!(reports[2].summary, None);

    let printed = output.contents();
    assert_eq!(printed.matches("Recorded 1 samples in").count(), 2);
    assert!(!printed.contains("No valid samples"));
}

#[tokio::test]
async fn test_coordinator_stops_running_monitors() {
    let probe = Arc::new(ScriptedProbe::new().script(TARGETS[0], [ok(10)]));
    let output = SharedBuffer::default();
    let ctx = context(probe.clone(), &output, no_alerts());
    let stop = StopSignal::new();
    let (requests, rx) = mpsc::channel(4);

    let coordinator = tokio::spawn(coordinate_shutdown(
        rx,
        stop.clone(),
        Reporter::new(OutputFormat::Text, output.clone()),
    ));
    let run = {
        let stop = stop.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            dispatch_targets(
                &[TARGETS[0].to_string()],
                settings(0, 10, Duration::from_secs(3600)),
                &ctx,
                &stop,
            )
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    requests.send("interrupt").await.unwrap();
    requests.send("interrupt").await.unwrap();

    let reports = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    drop(requests);
    coordinator.await.unwrap();

    assert_eq!(reports[0].exit, ExitReason::Stopped);
    let printed = output.contents();
    assert_eq!(printed.matches("received interrupt signal, terminating").count(), 1);
}

#[tokio::test]
async fn test_stop_before_start_still_probes_once() {
    let probe = Arc::new(ScriptedProbe::new().script(TARGETS[0], [ok(10), ok(10)]));
    let output = SharedBuffer::default();
    let ctx = context(probe.clone(), &output, no_alerts());
    let stop = StopSignal::new();
    stop.close();

    let reports = dispatch_targets(
        &[TARGETS[0].to_string()],
        settings(0, 10, Duration::from_secs(3600)),
        &ctx,
        &stop,
    )
    .await
    .unwrap();

    assert_eq!(reports[0].exit, ExitReason::Stopped);
    assert_eq!(probe.calls(TARGETS[0]), 1);
}
