//! Precondition faults raised by [`crate::tls::Connector::retrieve`].
//!
//! These are the only errors that escape the connector. Network, negotiation and
//! handshake failures are reported inside [`crate::tls::SessionSummary::Failure`].

use thiserror::Error;

/// Invalid input detected before any I/O takes place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrieveError {
    /// A required argument was empty or whitespace only
    #[error("{field} cannot be null or empty")]
    InvalidArgument {
        /// Which argument was invalid
        field: &'static str,
    },

    /// An argument fell outside its accepted domain
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        /// Which argument was invalid
        field: &'static str,
        /// The offending value, rendered as text
        value: String,
        /// Human-readable description of the accepted values
        expected: String,
    },
}

impl RetrieveError {
    /// Name of the argument that failed validation
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidArgument { field } | Self::OutOfRange { field, .. } => field,
        }
    }
}
