use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, trace, warn};

use crate::monitors::LoopSettings;
use crate::output::OutputFormat;
use crate::probe::normalize_target;
use crate::util::{
    LOCATION_ENV, PUSHGATEWAY_ENV, TARGETS_ENV, THRESHOLD_ENV, TWILIO_RECEIVERS_ENV,
    TWILIO_SENDER_ENV, TWILIO_SID_ENV, TWILIO_TOKEN_ENV, WEBHOOK_ENV, location_from, split_list,
};

const DEFAULT_DELAY_SECS: u64 = 10;
const DEFAULT_MAX_FAILURES: u32 = 10;
const DEFAULT_ALERT_INTERVAL_SECS: u64 = 300;

/// Probe one or more URLs in parallel, every `-d` seconds, and report DNS,
/// TCP, TLS, first byte and total response times.
///
/// Stops after `-n` samples per target, after `-f` failures on a target, or
/// when interrupted. Alerts via Twilio SMS when a response is slower than
/// `-A` milliseconds (credentials and receivers come from the environment).
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "perfprobe", version)]
pub struct Args {
    /// Delay in seconds between requests to a target [default: 10]
    #[arg(short = 'd')]
    pub delay: Option<u64>,

    /// Maximum number of failures before a target is given up [default: 10]
    #[arg(short = 'f')]
    pub max_failures: Option<u32>,

    /// Number of samples per target; 0 runs until interrupted [default: 0]
    #[arg(short = 'n')]
    pub attempts: Option<u64>,

    /// Write samples as JSON instead of tab separated text
    #[arg(short = 'j')]
    pub json: bool,

    /// Alert threshold in milliseconds; 0 disables alerting
    #[arg(short = 'A')]
    pub alert_threshold_ms: Option<u64>,

    /// Minimum interval between alerts in seconds [default: 300]
    #[arg(short = 'M')]
    pub alert_interval: Option<u64>,

    /// Publish response times to the Pushgateway in $PUSHGATEWAY_URL
    #[arg(short = 'c')]
    pub pushgateway: bool,

    /// Webhook URL receiving each sample as JSON via POST (https only)
    #[arg(short = 'W')]
    pub webhook: Option<String>,

    /// Location reported with every sample [default: $PERFTEST_LOCATION or host name]
    #[arg(short = 'L')]
    pub location: Option<String>,

    /// Only log errors
    #[arg(short = 'q')]
    pub quiet: bool,

    /// More logging, repeat for more detail
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Optional JSON file with the same settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// URLs to probe
    pub targets: Vec<String>,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// Settings accepted from `--config`. Every field is optional; command line
/// flags take precedence.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    pub delay: Option<u64>,
    pub max_failures: Option<u32>,
    pub attempts: Option<u64>,
    pub format: Option<OutputFormat>,
    pub alert_threshold_ms: Option<u64>,
    pub alert_interval: Option<u64>,
    pub webhook: Option<String>,
    pub pushgateway: Option<String>,
    pub location: Option<String>,
}

pub fn read_config_file(path: &Path) -> anyhow::Result<FileConfig> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

#[derive(Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub sender: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("sender", &self.sender)
            .finish()
    }
}

/// Fully resolved configuration handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub targets: Vec<String>,
    pub delay: Duration,
    pub max_failures: u32,
    /// Successful samples per target, 0 for unbounded
    pub attempts: u64,
    pub format: OutputFormat,
    /// `None` disables alerting
    pub alert_threshold: Option<Duration>,
    pub alert_interval: Duration,
    pub webhook_url: Option<String>,
    pub pushgateway_url: Option<String>,
    pub location: String,
    pub twilio: Option<TwilioCredentials>,
    pub sms_recipients: Vec<String>,
}

impl MonitorConfig {
    /// Merges command line, environment and config file. Fails when no
    /// target is left or a target is not a valid HTTP(S) URL.
    pub fn resolve(
        args: &Args,
        file: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let file = file.unwrap_or_default();

        let mut raw_targets = file.targets.clone();
        raw_targets.extend(args.targets.iter().cloned());
        if let Some(from_env) = env(TARGETS_ENV) {
            raw_targets.extend(split_list(&from_env));
        }
        if raw_targets.is_empty() {
            bail!("no destinations to test");
        }
        let targets = raw_targets
            .iter()
            .map(|raw| normalize_target(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let webhook_url = match (args.webhook.clone(), env(WEBHOOK_ENV)) {
            (Some(cli), Some(from_env)) => {
                info!("overwriting webhook {from_env} from environment via command line");
                Some(cli)
            }
            (Some(cli), None) => Some(cli),
            (None, from_env) => from_env.or(file.webhook),
        }
        .filter(|url| {
            let https = url.starts_with("https://");
            if !https {
                error!("webhook URL must start with https://, ignoring {url}");
            }
            https
        });

        let alert_threshold_ms = match args.alert_threshold_ms.filter(|ms| *ms > 0) {
            Some(ms) => {
                if let Some(from_env) = env(THRESHOLD_ENV) {
                    info!("alert threshold from command line overrides environment: {from_env}");
                }
                ms
            }
            None => match env(THRESHOLD_ENV).map(|value| value.trim().parse::<u64>()) {
                Some(Ok(ms)) => ms,
                Some(Err(e)) => {
                    warn!("parsing environment variable {THRESHOLD_ENV}: {e}");
                    file.alert_threshold_ms.unwrap_or(0)
                }
                None => file.alert_threshold_ms.unwrap_or(0),
            },
        };

        let pushgateway_url = if args.pushgateway {
            let url = env(PUSHGATEWAY_ENV).or(file.pushgateway.clone());
            if url.is_none() {
                warn!("pushgateway requested but {PUSHGATEWAY_ENV} is not set, not publishing");
            }
            url
        } else {
            file.pushgateway.clone()
        };

        let location = args
            .location
            .clone()
            .or(file.location.clone())
            .unwrap_or_else(|| location_from(&env));

        let twilio = match (env(TWILIO_SID_ENV), env(TWILIO_TOKEN_ENV)) {
            (Some(account_sid), Some(auth_token)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                sender: env(TWILIO_SENDER_ENV).unwrap_or_default(),
            }),
            _ => None,
        };

        let format = if args.json {
            OutputFormat::Json
        } else {
            file.format.unwrap_or_default()
        };

        Ok(Self {
            targets,
            delay: Duration::from_secs(args.delay.or(file.delay).unwrap_or(DEFAULT_DELAY_SECS)),
            max_failures: args
                .max_failures
                .or(file.max_failures)
                .unwrap_or(DEFAULT_MAX_FAILURES),
            attempts: args.attempts.or(file.attempts).unwrap_or(0),
            format,
            alert_threshold: (alert_threshold_ms > 0)
                .then(|| Duration::from_millis(alert_threshold_ms)),
            alert_interval: Duration::from_secs(
                args.alert_interval
                    .or(file.alert_interval)
                    .unwrap_or(DEFAULT_ALERT_INTERVAL_SECS),
            ),
            webhook_url,
            pushgateway_url,
            location,
            twilio,
            sms_recipients: env(TWILIO_RECEIVERS_ENV)
                .map(|list| split_list(&list))
                .unwrap_or_default(),
        })
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_attempts: self.attempts,
            max_failures: self.max_failures,
            delay: self.delay,
        }
    }
}
