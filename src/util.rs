use std::time::Duration;

pub const TARGETS_ENV: &str = "PERFTEST_URL";
pub const WEBHOOK_ENV: &str = "HTTP_JSON_WEBHOOK";
pub const THRESHOLD_ENV: &str = "RESPONSE_THRESHOLD";
pub const PUSHGATEWAY_ENV: &str = "PUSHGATEWAY_URL";
pub const LOCATION_ENV: &str = "PERFTEST_LOCATION";
pub const TWILIO_SID_ENV: &str = "TWILIO_ACCOUNT_SID";
pub const TWILIO_TOKEN_ENV: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_RECEIVERS_ENV: &str = "TWILIO_SMS_RECEIVERS";
pub const TWILIO_SENDER_ENV: &str = "TWILIO_SMS_SENDER";

const DEFAULT_LOCATION: &str = "unknown";

/// Reads a variable from the process environment, treating empty values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Where this instance probes from: `PERFTEST_LOCATION`, then the host name.
pub fn location_from(env: impl Fn(&str) -> Option<String>) -> String {
    env(LOCATION_ENV)
        .or_else(|| env("HOSTNAME"))
        .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
}

/// Splits a space separated list, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Formats elapsed wall time the way the summary reports it, e.g. `1h02m03s`.
pub fn hhmmss(elapsed: Duration) -> String {
    let mut secs = elapsed.as_secs();
    let hours = secs / 3600;
    secs -= hours * 3600;
    let minutes = secs / 60;
    secs -= minutes * 60;

    if hours > 0 {
        format!("{hours}h{minutes:02}m{secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs:02}s")
    } else {
        format!("{secs}s")
    }
}
