//! Sinks wired into the probe loop
//!
//! - Real HTTP probing against a local server, published to webhook and
//!   Pushgateway endpoints
//! - Broken sinks never stop probing
//! - Missing notification recipients only consume the alert slot

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use perfprobe::alerts::{AlertManager, AlertOutcome};
use perfprobe::monitors::{ExitReason, TargetMonitor};
use perfprobe::probe::{HttpProbe, normalize_target};
use perfprobe::sinks::{PushgatewaySink, WebhookSink, sink_client};
use perfprobe::stop::StopSignal;
use perfprobe::TimingSample;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_http_probe_feeds_every_sink() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("healthy"))
        .expect(2)
        .mount(&origin)
        .await;

    let collector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_string_contains("\"status\":200"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&collector)
        .await;
    Mock::given(method("POST"))
        .and(path("/metrics/job/perfprobe"))
        .and(body_string_contains("perfprobe_response_time_ms{"))
        .and(body_string_contains("code=\"200\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&collector)
        .await;

    let target = normalize_target(&format!("{}/health?ignored=1", origin.uri())).unwrap();
    let webhook = WebhookSink::with_client(
        format!("{}/hook", collector.uri()),
        sink_client(Duration::from_secs(5), Duration::from_secs(1)).unwrap(),
    )
    .unwrap();
    let pushgateway = PushgatewaySink::new(&collector.uri()).unwrap();

    let output = SharedBuffer::default();
    let ctx = context(
        Arc::new(HttpProbe::new("test").unwrap().with_timeout(Duration::from_secs(5))),
        &output,
        no_alerts(),
    )
    .with_webhook(Arc::new(webhook))
    .with_metrics(Arc::new(pushgateway));

    let report = TargetMonitor::new(
        target.clone(),
        settings(2, 3, Duration::ZERO),
        ctx,
        StopSignal::new(),
    )
    .run()
    .await;

    assert_eq!(report.exit, ExitReason::Completed);
    assert_eq!(report.failures, 0);
    let summary = report.summary.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.size, 7.0);
    assert_eq!(summary.statuses.get("200"), Some(&2));
    assert!(output.contents().contains(&target));
}

#[tokio::test]
async fn test_broken_sinks_do_not_stop_probing() {
    const TARGET: &str = "https://a.example/";
    let probe = Arc::new(ScriptedProbe::new().script(TARGET, [ok(10), ok(20), ok(30)]));
    let broken = Arc::new(BrokenSink::default());
    let output = SharedBuffer::default();
    let ctx = context(probe, &output, no_alerts())
        .with_webhook(broken.clone())
        .with_metrics(broken.clone());

    let report = TargetMonitor::new(
        TARGET,
        settings(3, 1, Duration::ZERO),
        ctx,
        StopSignal::new(),
    )
    .run()
    .await;

    assert_eq!(report.exit, ExitReason::Completed);
    assert_eq!(report.failures, 0);
    assert_eq!(broken.attempts.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_recording_sinks_receive_each_sample() {
    const TARGET: &str = "https://a.example/";
    let probe = Arc::new(ScriptedProbe::new().script(TARGET, [ok(10), Step::Fail, ok(30)]));
    let metrics = Arc::new(RecordingMetrics::default());
    let webhook = Arc::new(RecordingWebhook::default());
    let output = SharedBuffer::default();
    let ctx = context(probe, &output, no_alerts())
        .with_webhook(webhook.clone())
        .with_metrics(metrics.clone());

    TargetMonitor::new(TARGET, settings(2, 5, Duration::ZERO), ctx, StopSignal::new())
        .run()
        .await;

    let published = metrics.published.lock().unwrap().clone();
    assert_eq!(
        published,
        vec![
            ("test".to_string(), TARGET.to_string(), "200".to_string(), 10.0),
            ("test".to_string(), TARGET.to_string(), "200".to_string(), 30.0),
        ]
    );
    let samples: Vec<TimingSample> = webhook.samples.lock().unwrap().clone();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[1].total, Duration::from_millis(30));
}

#[tokio::test]
async fn test_unconfigured_notifier_still_consumes_slot() {
    let alerts = AlertManager::new(Some(Duration::from_millis(100)), Duration::from_secs(300));

    let first = alerts.consider(&sample("https://a.example/", 150, 0), "https://a.example/").await;
    let second = alerts
        .consider(&sample("https://b.example/", 150, 10), "https://b.example/")
        .await;

    assert_eq!(first, AlertOutcome::Unconfigured);
    assert_eq!(second, AlertOutcome::Suppressed);
}
