use crate::error::RetrieveError;
use anyhow::{Context, Result, anyhow};
use rustls::RootCertStore;
use rustls_pemfile::certs;
use serde::Serialize;
use std::{fmt, io::Cursor, path::Path, str::FromStr, sync::Arc, time::Duration};
use tokio::fs;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How TLS is reached on the remote endpoint
///
/// `Https` and `Smtps` both start the handshake immediately after connecting;
/// `SmtpStartTls` negotiates the upgrade over plain-text SMTP first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    #[default]
    Https,
    Smtps,
    #[serde(rename = "starttls")]
    SmtpStartTls,
}

impl ProtocolMode {
    pub const ALL: [Self; 3] = [Self::Https, Self::Smtps, Self::SmtpStartTls];

    /// Whether a plain-text negotiation precedes the handshake
    #[must_use]
    pub const fn is_opportunistic(self) -> bool {
        matches!(self, Self::SmtpStartTls)
    }

    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Https => 443,
            Self::Smtps => 465,
            Self::SmtpStartTls => 587,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Smtps => "smtps",
            Self::SmtpStartTls => "starttls",
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolMode {
    type Err = RetrieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "https" | "tls" => Ok(Self::Https),
            "smtps" => Ok(Self::Smtps),
            "starttls" | "smtp-starttls" => Ok(Self::SmtpStartTls),
            _ => Err(RetrieveError::OutOfRange {
                field: "mode",
                value: s.to_string(),
                expected: "one of https, smtps, starttls".to_string(),
            }),
        }
    }
}

/// Connector settings shared by every attempt
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Bound on DNS resolution plus the TCP connect to each resolved address
    pub connect_timeout: Duration,
    /// Bound on each plain-text read or write
    pub io_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Trust anchors used to compute the validation outcome
    pub roots: Arc<RootCertStore>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            roots: Arc::new(default_root_store()),
        }
    }
}

/// Mozilla's root set as shipped by `webpki-roots`
#[must_use]
pub fn default_root_store() -> RootCertStore {
    webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect()
}

/// Build the trust store: default roots plus every certificate in `extra_ca`
///
/// # Errors
///
/// Returns an error if the bundle cannot be read, is not valid PEM, contains no
/// certificates, or holds a certificate that cannot be used as a trust anchor
pub async fn load_root_store(extra_ca: Option<&Path>) -> Result<RootCertStore> {
    let mut root_store = default_root_store();

    let Some(path) = extra_ca else {
        return Ok(root_store);
    };

    let data = fs::read(path)
        .await
        .with_context(|| format!("failed to read CA bundle {}", path.display()))?;
    let mut reader = Cursor::new(data);
    let parsed = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("invalid CA bundle PEM: {e}"))?;

    if parsed.is_empty() {
        anyhow::bail!("no certificates found in {}", path.display());
    }

    for cert in parsed {
        root_store
            .add(cert)
            .map_err(|e| anyhow!("unusable trust anchor in {}: {e}", path.display()))?;
    }

    Ok(root_store)
}
