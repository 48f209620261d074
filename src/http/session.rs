//! Persistent HTTP sessions
//!
//! A session is a dedicated client whose connection is opened once and
//! reused for every request issued through it. Closing it drops the client
//! and with it the pooled connection.

use reqwest::Client;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::client::{fetch, ClientOptions, DrainedResponse, Endpoint, HttpError};

/// Persistent, possibly multiplexed connection to one endpoint
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    client: Mutex<Option<Client>>,
}

impl Session {
    /// Create the session without touching the network
    pub fn open(endpoint: Endpoint, options: &ClientOptions) -> Result<Self, HttpError> {
        let client = options.clone().keep_alive(true).build_client()?;
        debug!("Opened {} session to {}", options.protocols, endpoint);

        Ok(Self {
            endpoint,
            client: Mutex::new(Some(client)),
        })
    }

    /// Prime the connection with one request
    pub async fn establish(&self) -> Result<DrainedResponse, HttpError> {
        let client = self.client()?;
        let drained = fetch(&client, &self.endpoint).await?;
        info!("Session to {} established over {}", self.endpoint, drained.version);
        Ok(drained)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Handle for issuing a request on this session
    pub fn client(&self) -> Result<Client, HttpError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| HttpError::SessionClosed(self.endpoint.url()))
    }

    pub fn is_closed(&self) -> bool {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Close the session. A second close is an error.
    pub fn close(&self) -> Result<(), HttpError> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match client {
            Some(client) => {
                drop(client);
                debug!("Closed session to {}", self.endpoint);
                Ok(())
            }
            None => Err(HttpError::SessionClosed(self.endpoint.url())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::AllowedProtocols;
    use crate::http::test_server::TestServer;

    fn session() -> Session {
        let endpoint = Endpoint::parse("https://localhost:8081/").unwrap();
        Session::open(endpoint, &ClientOptions::new(AllowedProtocols::Http2Only)).unwrap()
    }

    #[test]
    fn test_close_once() {
        let session = session();
        assert!(!session.is_closed());
        assert!(session.close().is_ok());
        assert!(session.is_closed());
    }

    #[test]
    fn test_second_close_is_error() {
        let session = session();
        session.close().unwrap();
        assert!(matches!(session.close(), Err(HttpError::SessionClosed(_))));
    }

    #[test]
    fn test_client_after_close() {
        let session = session();
        assert!(session.client().is_ok());
        session.close().unwrap();
        assert!(session.client().is_err());
    }

    #[tokio::test]
    async fn test_establish_primes_connection() {
        let server = TestServer::start("200 OK", "ok").await;
        let session = Session::open(
            server.endpoint(),
            &ClientOptions::new(AllowedProtocols::Http1Only),
        )
        .unwrap();

        let drained = session.establish().await.unwrap();
        assert_eq!(drained.status, 200);
        assert_eq!(drained.body_bytes, 2);
    }
}
