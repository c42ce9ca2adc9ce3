use super::CertificateSummary;
use serde::Serialize;
use std::fmt;

/// Result of checking the presented chain against trust and hostname rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    #[default]
    NoErrors,
    /// The chain does not lead to a trusted root, or a certificate in it is invalid
    ChainErrors,
    /// The leaf certificate is not valid for the requested host
    NameMismatch,
    ChainErrorsAndNameMismatch,
}

impl ValidationOutcome {
    /// Combine the result of the chain-of-trust check with the name check
    #[must_use]
    pub const fn from_checks(chain_ok: bool, name_ok: bool) -> Self {
        match (chain_ok, name_ok) {
            (true, true) => Self::NoErrors,
            (false, true) => Self::ChainErrors,
            (true, false) => Self::NameMismatch,
            (false, false) => Self::ChainErrorsAndNameMismatch,
        }
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::NoErrors)
    }

    #[must_use]
    pub const fn has_chain_errors(self) -> bool {
        matches!(self, Self::ChainErrors | Self::ChainErrorsAndNameMismatch)
    }

    #[must_use]
    pub const fn has_name_mismatch(self) -> bool {
        matches!(self, Self::NameMismatch | Self::ChainErrorsAndNameMismatch)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return f.write_str("no errors");
        }

        let mut problems = Vec::with_capacity(2);
        if self.has_chain_errors() {
            problems.push("certificate chain errors");
        }
        if self.has_name_mismatch() {
            problems.push("certificate name mismatch");
        }
        f.write_str(&problems.join(", "))
    }
}

/// Details of a completed TLS handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Negotiated cipher suite (e.g. `TLS13_AES_256_GCM_SHA384`)
    pub cipher_suite: String,
    /// Bulk encryption algorithm (e.g. `AES-256-GCM`)
    pub cipher_algorithm: String,
    /// Bulk encryption key size in bits
    pub cipher_strength: u16,
    /// Negotiated protocol version (e.g. `TLSv1.3`)
    pub protocol: String,
    pub validation: ValidationOutcome,
    /// Reason for every failed validation check, empty when `validation` is `NoErrors`
    pub validation_errors: Vec<String>,
    /// Leaf certificate; absent only if it could not be captured or parsed
    pub certificate: Option<CertificateSummary>,
    /// Presented chain, leaf first
    pub chain: Vec<CertificateSummary>,
}

/// Outcome of one connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionSummary {
    Success(Session),
    Failure { error: String },
}

impl SessionSummary {
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// True only for a successful session whose validation produced no errors
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        match self {
            Self::Success(session) => session.validation.is_ok(),
            Self::Failure { .. } => false,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error.as_str()),
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Success(session) => Some(session),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub const fn certificate(&self) -> Option<&CertificateSummary> {
        match self {
            Self::Success(session) => session.certificate.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    /// Presented chain; always empty for a failure
    #[must_use]
    pub fn chain(&self) -> &[CertificateSummary] {
        match self {
            Self::Success(session) => &session.chain,
            Self::Failure { .. } => &[],
        }
    }
}
