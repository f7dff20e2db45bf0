//! Probe Operation: one network request against one target.
//!
//! The engine only sees the [`Probe`] trait. An attempt either yields a
//! complete [`TimingSample`] or a [`ProbeError`], never anything partial.

pub mod http;

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::TimingSample;

pub use http::HttpProbe;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Performs exactly one attempt. Implementations must bound the time
    /// they spend in here.
    async fn probe(&self, target: &str) -> Result<TimingSample, ProbeError>;
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("DNS lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no addresses found for {0}")]
    NoAddress(String),

    #[error("TCP connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Reduces a target to the identifier reported in samples: scheme, host,
/// non-default port and path. A missing scheme defaults to `https`.
pub fn normalize_target(raw: &str) -> Result<String, ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidTarget {
        target: raw.to_string(),
        reason,
    };

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    let Some(host) = url.host_str() else {
        return Err(invalid("missing host".to_string()));
    };

    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(format!("{}://{}{}", url.scheme(), authority, url.path()))
}
