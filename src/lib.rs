//! Inspect the TLS identity presented by a remote endpoint.
//!
//! See [`tls::Connector::retrieve`] for the entry point.

pub mod cli;
pub mod error;
pub mod tls;

pub use error::RetrieveError;
