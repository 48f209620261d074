//! HTTP transport module
//!
//! Client construction, persistent sessions and response draining used by
//! the benchmark strategies.

mod client;
mod session;

#[cfg(test)]
pub(crate) mod test_server;

pub use client::{
    fetch, AllowedProtocols, ClientOptions, DrainedResponse, Endpoint, HttpError, Scheme,
};
pub use session::Session;
