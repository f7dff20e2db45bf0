//! End-to-end probe loop scenarios
//!
//! - Bounded run with averages in the summary
//! - Failure ceiling without any successful sample
//! - Debounced alerting across samples and targets

use std::sync::Arc;
use std::time::Duration;

use perfprobe::alerts::AlertManager;
use perfprobe::dispatch::dispatch_targets;
use perfprobe::monitors::{ExitReason, TargetMonitor};
use perfprobe::stop::StopSignal;
use pretty_assertions::assert_eq;

use crate::helpers::*;

const TARGET: &str = "https://a.example/";

#[tokio::test]
async fn test_three_samples_average_response_time() {
    let probe = Arc::new(ScriptedProbe::new().script(TARGET, [ok(10), ok(20), ok(30)]));
    let output = SharedBuffer::default();
    let monitor = TargetMonitor::new(
        TARGET,
        settings(3, 10, Duration::ZERO),
        context(probe.clone(), &output, no_alerts()),
        StopSignal::new(),
    );

    let report = monitor.run().await;

    assert_eq!(report.exit, ExitReason::Completed);
    assert_eq!(probe.calls(TARGET), 3);
    let summary = report.summary.expect("summary for successful run");
    assert_eq!(summary.count, 3);
    assert!((summary.response_ms - 20.0).abs() < 1e-9);

    let printed = output.contents();
    assert_eq!(printed.lines().filter(|l| l.ends_with(TARGET)).count(), 4);
    assert!(printed.contains("Recorded 3 samples in "));
    assert!(printed.contains(", average values:\n#\tStart"));
    assert!(printed.contains("\t20.000\t"));
}

#[tokio::test]
async fn test_failure_ceiling_prints_no_valid_samples() {
    let probe = Arc::new(ScriptedProbe::new().script(TARGET, [Step::Fail, Step::Fail, ok(10)]));
    let output = SharedBuffer::default();
    let monitor = TargetMonitor::new(
        TARGET,
        settings(0, 2, Duration::ZERO),
        context(probe.clone(), &output, no_alerts()),
        StopSignal::new(),
    );

    let report = monitor.run().await;

    assert_eq!(report.exit, ExitReason::FailureCeiling);
    assert_eq!(report.failures, 2);
    assert_eq!(probe.calls(TARGET), 2);
    assert_eq!(report.summary, None);

    let printed = output.contents();
    assert_eq!(
        printed,
        format!("No valid samples received from {TARGET}, no summary provided\n")
    );
}

#[tokio::test]
async fn test_alert_debounce_on_one_target() {
    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = AlertManager::new(Some(Duration::from_millis(100)), Duration::from_secs(300))
        .with_notifier(notifier.clone(), vec!["+15550001".to_string()]);
    let probe = Arc::new(ScriptedProbe::new().script(
        TARGET,
        [ok_at(150, 0), ok_at(150, 100), ok_at(150, 400)],
    ));
    let output = SharedBuffer::default();

    let report = TargetMonitor::new(
        TARGET,
        settings(3, 10, Duration::ZERO),
        context(probe, &output, alerts),
        StopSignal::new(),
    )
    .run()
    .await;

    assert_eq!(report.successes, 3);
    let sent = notifier.messages();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].0.contains(TARGET));
    assert!(sent[0].0.contains("exceeds 100ms"));
    assert_eq!(sent[0].1, "+15550001");
}

#[tokio::test]
async fn test_alert_debounce_is_shared_between_targets() {
    let other = "https://b.example/";
    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = AlertManager::new(Some(Duration::from_millis(100)), Duration::from_secs(300))
        .with_notifier(notifier.clone(), vec!["+15550001".to_string()]);
    let probe = Arc::new(
        ScriptedProbe::new()
            .script(TARGET, [ok_at(150, 0)])
            .script(other, [ok_at(150, 100)]),
    );
    let output = SharedBuffer::default();
    let ctx = context(probe, &output, alerts);

    let reports = dispatch_targets(
        &[TARGET.to_string(), other.to_string()],
        settings(1, 10, Duration::ZERO),
        &ctx,
        &StopSignal::new(),
    )
    .await
    .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_below_threshold_never_alerts() {
    let notifier = Arc::new(RecordingNotifier::default());
    let alerts = AlertManager::new(Some(Duration::from_millis(100)), Duration::ZERO)
        .with_notifier(notifier.clone(), vec!["+15550001".to_string()]);
    let probe = Arc::new(ScriptedProbe::new().script(TARGET, [ok(100), ok(99), ok(50)]));
    let output = SharedBuffer::default();

    TargetMonitor::new(
        TARGET,
        settings(3, 10, Duration::ZERO),
        context(probe, &output, alerts),
        StopSignal::new(),
    )
    .run()
    .await;

    assert!(notifier.messages().is_empty());
}
