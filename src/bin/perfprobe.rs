use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use perfprobe::{
    alerts::AlertManager,
    config::{Args, MonitorConfig, read_config_file},
    dispatch::dispatch_targets,
    monitors::TargetContext,
    output::Reporter,
    probe::HttpProbe,
    sinks::{PushgatewaySink, TwilioNotifier, WebhookSink},
    stop::{StopSignal, coordinate_shutdown, termination_requests},
    util::env_var,
};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init(level: LevelFilter) {
    let filter = filter::Targets::new()
        .with_targets(vec![("perfprobe", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn build_alerts(config: &MonitorConfig) -> AlertManager {
    let alerts = AlertManager::new(config.alert_threshold, config.alert_interval);

    let Some(credentials) = config.twilio.clone() else {
        return alerts;
    };
    match TwilioNotifier::new(credentials) {
        Ok(notifier) => alerts.with_notifier(Arc::new(notifier), config.sms_recipients.clone()),
        Err(e) => {
            error!("SMS notifications disabled: {e:#}");
            alerts
        }
    }
}

fn build_context(config: &MonitorConfig) -> anyhow::Result<TargetContext> {
    let probe = HttpProbe::new(config.location.clone())?;
    let reporter = Reporter::stdout(config.format);
    let mut ctx = TargetContext::new(Arc::new(probe), reporter, Arc::new(build_alerts(config)))
        .with_location(config.location.clone());

    if let Some(url) = &config.pushgateway_url {
        match PushgatewaySink::new(url) {
            Ok(sink) => {
                info!("publishing response times to {}", sink.endpoint());
                ctx = ctx.with_metrics(Arc::new(sink));
            }
            Err(e) => error!("pushgateway disabled: {e:#}"),
        }
    }

    if let Some(url) = &config.webhook_url {
        match WebhookSink::new(url.clone()) {
            Ok(sink) => {
                info!("sending samples to webhook {}", sink.url());
                ctx = ctx.with_webhook(Arc::new(sink));
            }
            Err(e) => error!("webhook disabled: {e:#}"),
        }
    }

    Ok(ctx)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();
    init(args.log_level());
    trace!("started with args: {args:?}");

    let file = args.config.as_deref().map(read_config_file).transpose()?;
    let config = MonitorConfig::resolve(&args, file, env_var)?;
    debug!("resolved configuration: {config:?}");

    let ctx = build_context(&config)?;
    ctx.reporter.header();

    let stop = StopSignal::new();
    let coordinator = tokio::spawn(coordinate_shutdown(
        termination_requests()?,
        stop.clone(),
        ctx.reporter.clone(),
    ));

    let reports = dispatch_targets(&config.targets, config.loop_settings(), &ctx, &stop).await?;
    coordinator.abort();

    for report in &reports {
        debug!(
            "{}: {:?} after {} samples and {} failures",
            report.target, report.exit, report.successes, report.failures
        );
    }

    Ok(())
}
