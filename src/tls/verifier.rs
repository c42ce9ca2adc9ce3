use super::ValidationOutcome;
use rustls::{
    DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        verify_server_cert_signed_by_trust_anchor, verify_server_name,
    },
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
};
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// What the verifier observed during one handshake
#[derive(Debug, Clone)]
pub struct CapturedHandshake {
    /// Presented chain, leaf first
    pub chain: Vec<CertificateDer<'static>>,
    pub outcome: ValidationOutcome,
    /// Reason for every failed check
    pub errors: Vec<String>,
}

/// A server certificate verifier that records the presented chain and its
/// validation outcome, then accepts the peer regardless of that outcome.
///
/// One instance belongs to exactly one connection attempt: the connector builds a
/// fresh verifier (and `ClientConfig`) per call, so concurrent attempts never see
/// each other's capture. Handshake signatures are still checked, so a peer must
/// hold the private key for the leaf it presents.
pub struct CapturingVerifier {
    captured: Arc<Mutex<Option<CapturedHandshake>>>,
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for CapturingVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturingVerifier")
            .field("captured", &self.captured)
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl CapturingVerifier {
    #[must_use]
    pub fn new(roots: Arc<RootCertStore>, provider: Arc<CryptoProvider>) -> Self {
        Self {
            captured: Arc::new(Mutex::new(None)),
            roots,
            provider,
        }
    }

    /// Take the capture recorded during the handshake
    ///
    /// Returns `None` if the handshake never reached certificate verification
    #[must_use]
    pub fn take_captured(&self) -> Option<CapturedHandshake> {
        self.captured.lock().ok()?.take()
    }

    /// Run the chain-of-trust and server-name checks independently
    fn evaluate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        now: UnixTime,
    ) -> (ValidationOutcome, Vec<String>) {
        let parsed = match ParsedCertificate::try_from(end_entity) {
            Ok(parsed) => parsed,
            Err(e) => {
                return (
                    ValidationOutcome::ChainErrorsAndNameMismatch,
                    vec![e.to_string()],
                );
            }
        };

        let mut errors = Vec::new();

        let chain = verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &self.roots,
            intermediates,
            now,
            self.provider.signature_verification_algorithms.all,
        );
        if let Err(e) = &chain {
            errors.push(e.to_string());
        }

        let name = verify_server_name(&parsed, server_name);
        if let Err(e) = &name {
            errors.push(e.to_string());
        }

        (
            ValidationOutcome::from_checks(chain.is_ok(), name.is_ok()),
            errors,
        )
    }
}

impl ServerCertVerifier for CapturingVerifier {
    /// Record the presented chain and validation outcome, then accept
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let (outcome, errors) = self.evaluate(end_entity, intermediates, server_name, now);

        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone().into_owned());
        chain.extend(intermediates.iter().map(|cert| cert.clone().into_owned()));

        if let Ok(mut captured) = self.captured.lock() {
            if captured.is_some() {
                log::warn!("certificate verification ran twice in one handshake, keeping latest");
            }
            *captured = Some(CapturedHandshake {
                chain,
                outcome,
                errors,
            });
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use rustls::crypto::ring::default_provider;
    use rustls_pemfile::certs;

    const SERVER_PEM: &[u8] = include_bytes!("../../tests/fixtures/server.pem");
    const CA_PEM: &[u8] = include_bytes!("../../tests/fixtures/ca.pem");

    fn load(pem: &[u8]) -> CertificateDer<'static> {
        let mut reader = pem;
        certs(&mut reader).next().unwrap().unwrap()
    }

    fn trusting_test_ca() -> Arc<RootCertStore> {
        let mut store = RootCertStore::empty();
        store.add(load(CA_PEM)).unwrap();
        Arc::new(store)
    }

    fn verifier(roots: Arc<RootCertStore>) -> CapturingVerifier {
        CapturingVerifier::new(roots, Arc::new(default_provider()))
    }

    fn verify(verifier: &CapturingVerifier, host: &str) -> CapturedHandshake {
        let server_name = ServerName::try_from(host.to_string()).unwrap();
        let result = verifier.verify_server_cert(
            &load(SERVER_PEM),
            &[],
            &server_name,
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok(), "verifier must always accept");
        verifier.take_captured().unwrap()
    }

    #[test]
    fn test_captured_initially_none() {
        let verifier = verifier(trusting_test_ca());
        assert!(verifier.take_captured().is_none());
    }

    #[test]
    fn test_trusted_chain_matching_name() {
        let captured = verify(&verifier(trusting_test_ca()), "localhost");

        assert_eq!(captured.outcome, ValidationOutcome::NoErrors);
        assert!(captured.errors.is_empty());
        assert_eq!(captured.chain.len(), 1);
        assert_eq!(captured.chain.first(), Some(&load(SERVER_PEM)));
    }

    #[test]
    fn test_untrusted_chain() {
        let captured = verify(&verifier(Arc::new(RootCertStore::empty())), "localhost");

        assert_eq!(captured.outcome, ValidationOutcome::ChainErrors);
        assert_eq!(captured.errors.len(), 1);
    }

    #[test]
    fn test_name_mismatch() {
        let captured = verify(&verifier(trusting_test_ca()), "example.com");

        assert_eq!(captured.outcome, ValidationOutcome::NameMismatch);
        assert_eq!(captured.errors.len(), 1);
    }

    #[test]
    fn test_untrusted_chain_and_name_mismatch() {
        let captured = verify(&verifier(Arc::new(RootCertStore::empty())), "example.com");

        assert_eq!(
            captured.outcome,
            ValidationOutcome::ChainErrorsAndNameMismatch
        );
        assert_eq!(captured.errors.len(), 2);
    }

    #[test]
    fn test_capture_includes_intermediates_in_order() {
        let verifier = verifier(trusting_test_ca());
        let server_name = ServerName::try_from("localhost").unwrap();
        verifier
            .verify_server_cert(
                &load(SERVER_PEM),
                &[load(CA_PEM)],
                &server_name,
                &[],
                UnixTime::now(),
            )
            .unwrap();

        let captured = verifier.take_captured().unwrap();
        assert_eq!(captured.chain, vec![load(SERVER_PEM), load(CA_PEM)]);
        assert_eq!(captured.outcome, ValidationOutcome::NoErrors);
    }

    #[test]
    fn test_capture_is_taken_once() {
        let verifier = verifier(trusting_test_ca());
        let _ = verify(&verifier, "localhost");
        assert!(verifier.take_captured().is_none());
    }

    #[test]
    fn test_separate_verifiers_do_not_share_capture() {
        let first = verifier(trusting_test_ca());
        let second = verifier(Arc::new(RootCertStore::empty()));

        let first_capture = verify(&first, "localhost");
        assert!(second.take_captured().is_none());

        let second_capture = verify(&second, "localhost");
        assert_eq!(first_capture.outcome, ValidationOutcome::NoErrors);
        assert_eq!(second_capture.outcome, ValidationOutcome::ChainErrors);
    }

    #[test]
    fn test_supported_schemes() {
        let verifier = verifier(trusting_test_ca());
        let schemes = verifier.supported_verify_schemes();
        assert!(schemes.contains(&SignatureScheme::ECDSA_NISTP256_SHA256));
        assert!(schemes.contains(&SignatureScheme::RSA_PSS_SHA256));
    }

    #[test]
    fn test_verifier_debug() {
        let debug_str = format!("{:?}", verifier(trusting_test_ca()));
        assert!(debug_str.contains("CapturingVerifier"));
    }
}
