//! HTTP transport facade
//!
//! Thin layer over `reqwest` that turns benchmark options into configured
//! clients and drains responses to their end.

use futures::StreamExt;
use reqwest::{Client, Response, Url, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// HTTP transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Connection to {0} failed")]
    ConnectionFailed(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Server answered with status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Session to {0} is already closed")]
    SessionClosed(String),
}

impl HttpError {
    /// Classify a reqwest error the way the benchmark reports it
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(url.to_string())
        } else if err.is_connect() {
            // reqwest folds TLS handshake failures into connect errors
            HttpError::ConnectionFailed(format!("{url}: {err}"))
        } else if err.is_body() || err.is_decode() {
            HttpError::Body(err.to_string())
        } else {
            HttpError::RequestFailed(err.to_string())
        }
    }
}

/// URL scheme of a benchmark target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target endpoint (scheme, host, port, path)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path including the query string, always starting with `/`
    pub path: String,
}

impl Endpoint {
    /// Parse an `http://` or `https://` URL
    pub fn parse(url: &str) -> Result<Self, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(HttpError::InvalidUrl(format!(
                    "{url}: unsupported scheme '{other}'"
                )))
            }
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl(format!("{url}: missing host")))?
            .to_string();
        let port = parsed.port().unwrap_or(scheme.default_port());

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    /// Full URL
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Protocols a client may speak, advertised through ALPN on TLS
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllowedProtocols {
    /// HTTP/1.1 only
    Http1Only,
    /// HTTP/2 only (h2 over TLS, prior knowledge on cleartext)
    Http2Only,
    /// Offer h2 and http/1.1 and let the server pick
    Negotiate,
}

impl AllowedProtocols {
    /// ALPN identifiers offered during the TLS handshake
    pub fn alpn(&self) -> &'static [&'static str] {
        match self {
            AllowedProtocols::Http1Only => &["http/1.1"],
            AllowedProtocols::Http2Only => &["h2"],
            AllowedProtocols::Negotiate => &["h2", "http/1.1"],
        }
    }
}

impl fmt::Display for AllowedProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alpn().join(","))
    }
}

/// Client configuration handed to the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    pub protocols: AllowedProtocols,
    /// Keep idle connections around for reuse
    pub keep_alive: bool,
    /// Accept self-signed or otherwise invalid server certificates
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            protocols: AllowedProtocols::Negotiate,
            keep_alive: true,
            accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    pub fn new(protocols: AllowedProtocols) -> Self {
        Self {
            protocols,
            ..Default::default()
        }
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a reqwest client honouring these options
    pub fn build_client(&self) -> Result<Client, HttpError> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        builder = match self.protocols {
            AllowedProtocols::Http1Only => builder.http1_only(),
            AllowedProtocols::Http2Only => builder.http2_prior_knowledge(),
            AllowedProtocols::Negotiate => builder,
        };

        if !self.keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }

        builder
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))
    }
}

/// A response whose body has been read to the end and discarded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrainedResponse {
    pub status: u16,
    pub version: String,
    pub body_bytes: u64,
}

/// Issue a GET against `endpoint` and drain the response
pub async fn fetch(client: &Client, endpoint: &Endpoint) -> Result<DrainedResponse, HttpError> {
    let url = endpoint.url();
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| HttpError::from_reqwest(e, &url))?;
    drain(response).await
}

/// Read the whole body, discarding it.
///
/// Statuses of 400 and above are reported as errors, but only after the
/// body has been consumed so the connection stays reusable.
pub async fn drain(response: Response) -> Result<DrainedResponse, HttpError> {
    let status = response.status();
    let version = version_name(response.version());
    let url = response.url().to_string();

    let mut body = response.bytes_stream();
    let mut body_bytes = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| HttpError::from_reqwest(e, &url))?;
        body_bytes += chunk.len() as u64;
    }

    debug!(
        "Drained {} {} from {} ({} bytes)",
        version,
        status.as_u16(),
        url,
        body_bytes
    );

    if status.as_u16() >= 400 {
        return Err(HttpError::Status(status.as_u16()));
    }

    Ok(DrainedResponse {
        status: status.as_u16(),
        version,
        body_bytes,
    })
}

fn version_name(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::TestServer;

    #[test]
    fn test_endpoint_parse() {
        let endpoint = Endpoint::parse("https://localhost:8081/bench?size=1").unwrap();
        assert_eq!(endpoint.scheme, Scheme::Https);
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 8081);
        assert_eq!(endpoint.path, "/bench?size=1");
        assert_eq!(endpoint.url(), "https://localhost:8081/bench?size=1");
    }

    #[test]
    fn test_endpoint_default_ports() {
        assert_eq!(Endpoint::parse("http://example.com").unwrap().port, 80);
        assert_eq!(Endpoint::parse("https://example.com").unwrap().port, 443);
        assert_eq!(Endpoint::parse("http://example.com").unwrap().path, "/");
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        assert!(matches!(
            Endpoint::parse("ftp://example.com/"),
            Err(HttpError::InvalidUrl(_))
        ));
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_alpn_lists() {
        assert_eq!(AllowedProtocols::Http1Only.alpn(), &["http/1.1"]);
        assert_eq!(AllowedProtocols::Negotiate.to_string(), "h2,http/1.1");
    }

    #[test]
    fn test_build_client_for_every_protocol_policy() {
        for protocols in [
            AllowedProtocols::Http1Only,
            AllowedProtocols::Http2Only,
            AllowedProtocols::Negotiate,
        ] {
            let options = ClientOptions::new(protocols)
                .keep_alive(false)
                .accept_invalid_certs(true);
            assert!(options.build_client().is_ok());
        }
    }

    #[tokio::test]
    async fn test_fetch_drains_body() {
        let server = TestServer::start("200 OK", "hello world").await;
        let client = ClientOptions::new(AllowedProtocols::Http1Only)
            .build_client()
            .unwrap();

        let drained = fetch(&client, &server.endpoint()).await.unwrap();
        assert_eq!(drained.status, 200);
        assert_eq!(drained.version, "HTTP/1.1");
        assert_eq!(drained.body_bytes, 11);
    }

    #[tokio::test]
    async fn test_fetch_reports_error_status() {
        let server = TestServer::start("503 Service Unavailable", "busy").await;
        let client = ClientOptions::new(AllowedProtocols::Http1Only)
            .build_client()
            .unwrap();

        let err = fetch(&client, &server.endpoint()).await.unwrap_err();
        assert_eq!(err, HttpError::Status(503));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let endpoint = TestServer::unused_endpoint().await;
        let client = ClientOptions::new(AllowedProtocols::Http1Only)
            .build_client()
            .unwrap();

        let err = fetch(&client, &endpoint).await.unwrap_err();
        assert!(matches!(err, HttpError::ConnectionFailed(_)));
    }
}
