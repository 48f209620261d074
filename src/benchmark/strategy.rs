//! Request strategies
//!
//! A strategy is a named recipe for issuing one request and reporting when
//! its response has been drained. The catalog lists the strategies the
//! benchmark compares.

use anyhow::{bail, Result};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::signal::{Completion, CompletionSignal};
use crate::http::{fetch, AllowedProtocols, ClientOptions, Endpoint, HttpError, Scheme, Session};

/// One way of issuing and completing a request
pub trait RequestStrategy: Send + Sync {
    /// Unique name within a run
    fn name(&self) -> &str;

    /// Issue exactly one request. The returned signal settles once the
    /// response body has been read to its end.
    fn execute(&self) -> CompletionSignal;

    /// Release strategy-scoped resources after measurement ended
    fn finish(&self) -> Result<(), HttpError> {
        Ok(())
    }
}

/// How long a persistent session lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    /// Closed by the suite once every strategy has run
    Run,
    /// Closed right after the owning strategy finished
    Strategy,
}

/// Connection policy of a strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// New connection per request
    DirectTransport,
    /// Idle connections reused across requests
    KeepAlivePooled,
    /// One pre-established session shared by every request
    PersistentSession(SessionScope),
    /// Protocol picked by ALPN; per-call client unless keep-alive is on
    AutoNegotiated,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::DirectTransport => f.write_str("direct transport"),
            StrategyKind::KeepAlivePooled => f.write_str("keep-alive pooled"),
            StrategyKind::PersistentSession(SessionScope::Run) => {
                f.write_str("persistent session (run)")
            }
            StrategyKind::PersistentSession(SessionScope::Strategy) => {
                f.write_str("persistent session (strategy)")
            }
            StrategyKind::AutoNegotiated => f.write_str("auto-negotiated"),
        }
    }
}

enum Transport {
    /// One client reused for every call
    Shared(Client),
    Session {
        session: Arc<Session>,
        scope: SessionScope,
    },
    /// A fresh client per call, dropped once its response is drained
    PerCall,
}

/// Strategy backed by the HTTP transport
pub struct HttpStrategy {
    name: String,
    kind: StrategyKind,
    endpoint: Endpoint,
    options: ClientOptions,
    transport: Transport,
}

impl HttpStrategy {
    /// New connection for every request
    pub fn direct(
        name: impl Into<String>,
        endpoint: Endpoint,
        options: ClientOptions,
    ) -> Result<Self, HttpError> {
        let options = options.keep_alive(false);
        let client = options.build_client()?;
        Ok(Self {
            name: name.into(),
            kind: StrategyKind::DirectTransport,
            endpoint,
            options,
            transport: Transport::Shared(client),
        })
    }

    /// Connections pooled and reused across requests
    pub fn pooled(
        name: impl Into<String>,
        endpoint: Endpoint,
        options: ClientOptions,
    ) -> Result<Self, HttpError> {
        let options = options.keep_alive(true);
        let client = options.build_client()?;
        Ok(Self {
            name: name.into(),
            kind: StrategyKind::KeepAlivePooled,
            endpoint,
            options,
            transport: Transport::Shared(client),
        })
    }

    /// Every request goes over `session`
    pub fn session(
        name: impl Into<String>,
        session: Arc<Session>,
        scope: SessionScope,
        options: ClientOptions,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StrategyKind::PersistentSession(scope),
            endpoint: session.endpoint().clone(),
            options,
            transport: Transport::Session { session, scope },
        }
    }

    /// Protocol chosen by negotiation over `options.protocols`
    pub fn auto(
        name: impl Into<String>,
        endpoint: Endpoint,
        options: ClientOptions,
    ) -> Result<Self, HttpError> {
        let transport = if options.keep_alive {
            Transport::Shared(options.build_client()?)
        } else {
            Transport::PerCall
        };
        Ok(Self {
            name: name.into(),
            kind: StrategyKind::AutoNegotiated,
            endpoint,
            options,
            transport,
        })
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn client(&self) -> Result<Client, HttpError> {
        match &self.transport {
            Transport::Shared(client) => Ok(client.clone()),
            Transport::Session { session, .. } => session.client(),
            Transport::PerCall => self.options.build_client(),
        }
    }
}

impl RequestStrategy for HttpStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> CompletionSignal {
        let client = match self.client() {
            Ok(client) => client,
            Err(err) => return CompletionSignal::ready(Err(err)),
        };
        let endpoint = self.endpoint.clone();

        CompletionSignal::spawn(async move {
            let drained = fetch(&client, &endpoint).await?;
            Ok(Completion::from(drained))
        })
    }

    fn finish(&self) -> Result<(), HttpError> {
        match &self.transport {
            Transport::Session {
                session,
                scope: SessionScope::Strategy,
            } => session.close(),
            _ => Ok(()),
        }
    }
}

/// Benchmark targets
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Targets {
    pub https: Endpoint,
    pub http: Endpoint,
}

impl Targets {
    fn for_scheme(&self, scheme: Scheme) -> &Endpoint {
        match scheme {
            Scheme::Https => &self.https,
            Scheme::Http => &self.http,
        }
    }
}

/// Static description of a catalog strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub kind: StrategyKind,
    pub protocols: AllowedProtocols,
    pub scheme: Scheme,
}

/// Every strategy the benchmark knows, in registration order
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "http2 - pooled",
        kind: StrategyKind::KeepAlivePooled,
        protocols: AllowedProtocols::Http2Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "http2 - preconfigured session",
        kind: StrategyKind::PersistentSession(SessionScope::Strategy),
        protocols: AllowedProtocols::Http2Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "auto",
        kind: StrategyKind::AutoNegotiated,
        protocols: AllowedProtocols::Negotiate,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "http2 - session",
        kind: StrategyKind::PersistentSession(SessionScope::Run),
        protocols: AllowedProtocols::Http2Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "https - auto - keepalive",
        kind: StrategyKind::AutoNegotiated,
        protocols: AllowedProtocols::Http1Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "https - keepalive",
        kind: StrategyKind::KeepAlivePooled,
        protocols: AllowedProtocols::Http1Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "https",
        kind: StrategyKind::DirectTransport,
        protocols: AllowedProtocols::Http1Only,
        scheme: Scheme::Https,
    },
    CatalogEntry {
        name: "http",
        kind: StrategyKind::DirectTransport,
        protocols: AllowedProtocols::Http1Only,
        scheme: Scheme::Http,
    },
];

impl CatalogEntry {
    /// Keep-alive is on for pooled kinds and for the keep-alive auto variant
    fn keep_alive(&self) -> bool {
        match self.kind {
            StrategyKind::DirectTransport => false,
            StrategyKind::KeepAlivePooled | StrategyKind::PersistentSession(_) => true,
            StrategyKind::AutoNegotiated => self.protocols == AllowedProtocols::Http1Only,
        }
    }
}

/// Pick catalog entries by name, keeping catalog order.
///
/// `None` selects everything; unknown names are an error.
pub fn select(only: Option<&[String]>) -> Result<Vec<&'static CatalogEntry>> {
    let Some(names) = only else {
        return Ok(CATALOG.iter().collect());
    };

    for name in names {
        if !CATALOG.iter().any(|entry| entry.name == name) {
            let known: Vec<&str> = CATALOG.iter().map(|e| e.name).collect();
            bail!("Unknown strategy '{}' (known: {})", name, known.join(", "));
        }
    }

    Ok(CATALOG
        .iter()
        .filter(|entry| names.iter().any(|n| n == entry.name))
        .collect())
}

/// Strategies built from the catalog plus the sessions the run owns
pub struct Catalog {
    pub strategies: Vec<HttpStrategy>,
    pub run_sessions: Vec<Arc<Session>>,
}

/// Build the selected strategies against `targets`.
///
/// Sessions are primed here; a priming failure is logged and left to
/// surface as failed iterations of the strategy using the session.
pub async fn build_catalog(
    targets: &Targets,
    entries: &[&CatalogEntry],
    accept_invalid_certs: bool,
    connect_timeout: Duration,
) -> Result<Catalog> {
    let mut strategies = Vec::with_capacity(entries.len());
    let mut run_sessions = Vec::new();

    for entry in entries {
        let endpoint = targets.for_scheme(entry.scheme).clone();
        let options = ClientOptions::new(entry.protocols)
            .keep_alive(entry.keep_alive())
            .accept_invalid_certs(accept_invalid_certs)
            .connect_timeout(connect_timeout);

        debug!(
            "Building '{}' ({}, alpn={}) against {}",
            entry.name, entry.kind, entry.protocols, endpoint
        );

        let strategy = match entry.kind {
            StrategyKind::DirectTransport => HttpStrategy::direct(entry.name, endpoint, options)?,
            StrategyKind::KeepAlivePooled => HttpStrategy::pooled(entry.name, endpoint, options)?,
            StrategyKind::AutoNegotiated => HttpStrategy::auto(entry.name, endpoint, options)?,
            StrategyKind::PersistentSession(scope) => {
                let session = Arc::new(Session::open(endpoint, &options)?);
                if let Err(err) = session.establish().await {
                    warn!("Could not establish session for '{}': {}", entry.name, err);
                }
                if scope == SessionScope::Run {
                    run_sessions.push(session.clone());
                }
                HttpStrategy::session(entry.name, session, scope, options)
            }
        };

        strategies.push(strategy);
    }

    Ok(Catalog {
        strategies,
        run_sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::signal::IterationError;
    use crate::http::test_server::TestServer;

    fn options() -> ClientOptions {
        ClientOptions::new(AllowedProtocols::Http1Only)
    }

    #[test]
    fn test_catalog_names_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
        assert_eq!(CATALOG.len(), 8);
    }

    #[test]
    fn test_catalog_keep_alive_policy() {
        let keep_alive = |name: &str| {
            CATALOG
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.keep_alive())
                .unwrap()
        };

        assert!(!keep_alive("https"));
        assert!(!keep_alive("auto"));
        assert!(keep_alive("https - auto - keepalive"));
        assert!(keep_alive("https - keepalive"));
        assert!(keep_alive("http2 - session"));
    }

    #[test]
    fn test_select_keeps_catalog_order() {
        let only = vec!["http".to_string(), "auto".to_string()];
        let selected = select(Some(&only)).unwrap();
        let names: Vec<&str> = selected.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["auto", "http"]);
    }

    #[test]
    fn test_select_rejects_unknown() {
        let only = vec!["gopher".to_string()];
        assert!(select(Some(&only)).is_err());
        assert_eq!(select(None).unwrap().len(), CATALOG.len());
    }

    #[tokio::test]
    async fn test_direct_strategy_completes() {
        let server = TestServer::start("200 OK", "payload").await;
        let strategy = HttpStrategy::direct("http", server.endpoint(), options()).unwrap();

        for _ in 0..3 {
            let completion = strategy
                .execute()
                .wait(Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(completion.body_bytes, 7);
            assert_eq!(completion.protocol.as_deref(), Some("HTTP/1.1"));
        }
    }

    #[tokio::test]
    async fn test_auto_strategy_per_call_client() {
        let server = TestServer::start("200 OK", "payload").await;
        let strategy =
            HttpStrategy::auto("auto", server.endpoint(), options().keep_alive(false)).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::AutoNegotiated);

        let completion = strategy
            .execute()
            .wait(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(completion.body_bytes, 7);
    }

    #[tokio::test]
    async fn test_refused_connection_fails_iteration() {
        let endpoint = TestServer::unused_endpoint().await;
        let strategy = HttpStrategy::pooled("pooled", endpoint, options()).unwrap();

        let err = strategy
            .execute()
            .wait(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IterationError::Failed(HttpError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_strategy_scoped_session_closed_by_finish() {
        let server = TestServer::start("200 OK", "ok").await;
        let session = Arc::new(Session::open(server.endpoint(), &options()).unwrap());
        let strategy = HttpStrategy::session(
            "session",
            session.clone(),
            SessionScope::Strategy,
            options(),
        );

        strategy
            .execute()
            .wait(Duration::from_secs(5))
            .await
            .unwrap();

        strategy.finish().unwrap();
        assert!(session.is_closed());
        assert!(strategy.finish().is_err());

        let err = strategy
            .execute()
            .wait(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, IterationError::Failed(HttpError::SessionClosed(_))));
    }

    #[test]
    fn test_run_scoped_session_left_open_by_finish() {
        let endpoint = Endpoint::parse("https://localhost:8081/").unwrap();
        let session = Arc::new(Session::open(endpoint, &options()).unwrap());
        let strategy =
            HttpStrategy::session("session", session.clone(), SessionScope::Run, options());

        strategy.finish().unwrap();
        assert!(!session.is_closed());
    }
}
