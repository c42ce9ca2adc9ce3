//! TLS session inspection
//!
//! This module connects to a remote endpoint, optionally upgrades a plain-text
//! SMTP session with STARTTLS, performs the TLS handshake and reports the
//! negotiated parameters together with the certificate chain the peer presented.
//!
//! # Module Organization
//!
//! - `certificate` - Certificate summary extracted from DER
//! - `config` - Protocol modes, timeouts and trust roots
//! - `connector` - Connection orchestration
//! - `starttls` - SMTP STARTTLS negotiation
//! - `summary` - Session result and validation outcome
//! - `verifier` - Per-attempt certificate capturing verifier
//!
//! # Example
//!
//! ```rust,ignore
//! use certview::tls::{Connector, ConnectorConfig, ProtocolMode, SessionSummary};
//!
//! let connector = Connector::new(ConnectorConfig::default());
//! match connector.retrieve("example.com", 443, ProtocolMode::Https).await? {
//!     SessionSummary::Success(session) => println!("{} {}", session.protocol, session.validation),
//!     SessionSummary::Failure { error } => eprintln!("{error}"),
//! }
//! ```

pub mod certificate;
pub mod config;
pub mod connector;
pub mod starttls;
pub mod summary;
pub mod verifier;

// Re-export commonly used types
pub use certificate::CertificateSummary;
pub use config::{ConnectorConfig, ProtocolMode, load_root_store};
pub use connector::{Connector, retrieve};
pub use summary::{Session, SessionSummary, ValidationOutcome};
pub use verifier::{CapturedHandshake, CapturingVerifier};
