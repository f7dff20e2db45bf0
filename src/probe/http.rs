use std::future::poll_fn;
use std::net::IpAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use hyper::Request;
use hyper::body::Body;
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, CONNECTION, HOST, USER_AGENT};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tokio_rustls::TlsConnector;
use tokio_util::task::AbortOnDropHandle;
use tracing::{instrument, trace};
use url::{Host, Url};

use super::{Probe, ProbeError};
use crate::TimingSample;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const AGENT: &str = concat!("perfprobe/", env!("CARGO_PKG_VERSION"));

/// Issues a single HTTP/1.1 GET per attempt on a fresh connection and times
/// each phase separately: DNS, TCP connect, TLS handshake, response head and
/// the rest of the body.
#[derive(Clone)]
pub struct HttpProbe {
    connector: TlsConnector,
    timeout: Duration,
    location: String,
}

impl HttpProbe {
    pub fn new(location: impl Into<String>) -> Result<Self, ProbeError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()?
                .with_root_certificates(roots)
                .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout: DEFAULT_PROBE_TIMEOUT,
            location: location.into(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(&self, target: &str) -> Result<TimingSample, ProbeError> {
        let endpoint = Endpoint::parse(target)?;
        let request = endpoint.request()?;

        let start = Utc::now();
        let began = Instant::now();

        let mark = Instant::now();
        let addr = lookup_host((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| ProbeError::Dns {
                host: endpoint.host.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ProbeError::NoAddress(endpoint.host.clone()))?;
        let dns = mark.elapsed();

        let mark = Instant::now();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ProbeError::Connect { addr, source })?;
        let tcp = mark.elapsed();
        let remote = stream.peer_addr().unwrap_or(addr);
        trace!("connected to {remote}");

        let (tls, exchange) = if endpoint.tls {
            let mark = Instant::now();
            let stream = self
                .connector
                .connect(endpoint.server_name()?, stream)
                .await
                .map_err(|source| ProbeError::Tls {
                    host: endpoint.host.clone(),
                    source,
                })?;
            let tls = mark.elapsed();
            (tls, exchange(stream, request).await?)
        } else {
            (Duration::ZERO, exchange(stream, request).await?)
        };

        Ok(TimingSample {
            target: target.to_string(),
            location: self.location.clone(),
            start,
            dns,
            tcp,
            tls,
            reply: exchange.reply,
            close: exchange.close,
            total: began.elapsed(),
            status: Some(exchange.status),
            size: exchange.size,
            remote: Some(remote.to_string()),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    #[instrument(skip_all, fields(url = %target))]
    async fn probe(&self, target: &str) -> Result<TimingSample, ProbeError> {
        tokio::time::timeout(self.timeout, self.fetch(target))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

struct Endpoint {
    /// Host used for resolution and SNI (IPv6 without brackets)
    host: String,
    ip: Option<IpAddr>,
    host_header: String,
    port: u16,
    path: String,
    tls: bool,
}

impl Endpoint {
    fn parse(target: &str) -> Result<Self, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(target).map_err(|e| invalid(&e.to_string()))?;
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(invalid("unsupported scheme")),
        };

        let (host, ip) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_string(), None),
            Some(Host::Ipv4(ip)) => (ip.to_string(), Some(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => (ip.to_string(), Some(IpAddr::V6(ip))),
            None => return Err(invalid("missing host")),
        };

        let host_str = url.host_str().unwrap_or(&host).to_string();
        let host_header = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str,
        };

        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        Ok(Self {
            host,
            ip,
            host_header,
            port: url.port_or_known_default().unwrap_or(if tls { 443 } else { 80 }),
            path,
            tls,
        })
    }

    fn server_name(&self) -> Result<ServerName<'static>, ProbeError> {
        match self.ip {
            Some(ip) => Ok(ServerName::IpAddress(ip.into())),
            None => ServerName::try_from(self.host.clone()).map_err(|e| {
                ProbeError::InvalidTarget {
                    target: self.host.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    fn request(&self) -> Result<Request<String>, ProbeError> {
        Request::get(self.path.as_str())
            .header(HOST, self.host_header.as_str())
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, "*/*")
            .header(CONNECTION, "close")
            .body(String::new())
            .map_err(|e| ProbeError::InvalidTarget {
                target: self.host_header.clone(),
                reason: e.to_string(),
            })
    }
}

struct Exchange {
    reply: Duration,
    close: Duration,
    status: u16,
    size: u64,
}

/// Sends `request` over an already established stream. Reply runs until the
/// response head is parsed, Close until the last body frame. Body bytes are
/// counted after transfer decoding and then dropped.
async fn exchange<S>(stream: S, request: Request<String>) -> Result<Exchange, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = http1::Builder::new()
        .title_case_headers(true)
        .handshake(TokioIo::new(stream))
        .await?;
    let _connection = AbortOnDropHandle::new(tokio::spawn(async move {
        if let Err(e) = connection.await {
            trace!("connection closed with error: {e}");
        }
    }));

    let mark = Instant::now();
    let response = sender.send_request(request).await?;
    let reply = mark.elapsed();
    let status = response.status().as_u16();

    let mark = Instant::now();
    let mut body = pin!(response.into_body());
    let mut size = 0u64;
    while let Some(frame) = poll_fn(|cx| body.as_mut().poll_frame(cx)).await {
        if let Some(data) = frame?.data_ref() {
            size += data.len() as u64;
        }
    }
    let close = mark.elapsed();

    Ok(Exchange {
        reply,
        close,
        status,
        size,
    })
}
