use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeStruct};
use x509_parser::prelude::{ASN1Time, FromDer, X509Certificate};

/// Descriptive fields of one X.509 certificate
///
/// Serializes with the derived `is_expired` and `days_remaining` as of the
/// moment of serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Issuer distinguished name (e.g. `C=US, O=Let's Encrypt, CN=R3`)
    pub issuer: String,
    /// Subject distinguished name
    pub subject: String,
    /// Serial number as uppercase hex of the raw serial bytes
    pub serial_number: String,
    /// Certificate version, 1-based (v3 certificates report 3)
    pub version: u32,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateSummary {
    /// Parse a DER-encoded certificate and extract its summary fields
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed or carries a validity
    /// timestamp that cannot be represented
    pub fn from_der(cert_der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;

        let serial_number = cert
            .raw_serial()
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect();

        Ok(Self {
            issuer: cert.issuer().to_string(),
            subject: cert.subject().to_string(),
            serial_number,
            version: cert.version().0 + 1,
            not_before: to_utc(&cert.validity().not_before)?,
            not_after: to_utc(&cert.validity().not_after)?,
        })
    }

    /// Whether the certificate is past its `not_after` date right now
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    /// Days until expiration (negative if expired)
    #[must_use]
    pub fn days_remaining(&self) -> i64 {
        (self.not_after - Utc::now()).num_days()
    }
}

impl Serialize for CertificateSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CertificateSummary", 8)?;
        state.serialize_field("issuer", &self.issuer)?;
        state.serialize_field("subject", &self.subject)?;
        state.serialize_field("serial_number", &self.serial_number)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("not_before", &self.not_before)?;
        state.serialize_field("not_after", &self.not_after)?;
        state.serialize_field("is_expired", &self.is_expired())?;
        state.serialize_field("days_remaining", &self.days_remaining())?;
        state.end()
    }
}

fn to_utc(time: &ASN1Time) -> Result<DateTime<Utc>> {
    let raw = time.to_datetime();
    DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond())
        .ok_or_else(|| anyhow!("invalid certificate timestamp"))
}
