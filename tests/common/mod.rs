#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use certview::tls::{CertificateSummary, Connector, ConnectorConfig, config::default_root_store};
use chrono::Utc;
use rustls::{
    RootCertStore, ServerConfig,
    crypto::ring::default_provider,
    pki_types::{CertificateDer, PrivateKeyDer},
};
use rustls_pemfile::{certs, private_key};
use std::{fs, io::Cursor, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    task::JoinHandle,
};
use tokio_rustls::TlsAcceptor;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_certs(name: &str) -> Vec<CertificateDer<'static>> {
    let mut reader = Cursor::new(fs::read(fixture(name)).unwrap());
    certs(&mut reader).collect::<Result<Vec<_>, _>>().unwrap()
}

pub fn load_key() -> PrivateKeyDer<'static> {
    let mut reader = Cursor::new(fs::read(fixture("server.key")).unwrap());
    private_key(&mut reader).unwrap().unwrap()
}

/// Leaf certificate for `localhost`, signed by the test CA
pub fn leaf_only() -> Vec<CertificateDer<'static>> {
    load_certs("server.pem")
}

/// Leaf followed by the test CA
pub fn leaf_and_ca() -> Vec<CertificateDer<'static>> {
    let mut chain = load_certs("server.pem");
    chain.extend(load_certs("ca.pem"));
    chain
}

pub fn test_ca_subject() -> String {
    let ca = load_certs("ca.pem");
    CertificateSummary::from_der(ca.first().unwrap()).unwrap().subject
}

fn connector_with_roots(roots: RootCertStore) -> Connector {
    Connector::new(ConnectorConfig {
        connect_timeout: TEST_TIMEOUT,
        io_timeout: TEST_TIMEOUT,
        handshake_timeout: TEST_TIMEOUT,
        roots: Arc::new(roots),
    })
}

/// Connector whose only trust anchor is the test CA
pub fn trusting_connector() -> Connector {
    let mut roots = RootCertStore::empty();
    for cert in load_certs("ca.pem") {
        roots.add(cert).unwrap();
    }
    connector_with_roots(roots)
}

/// Connector with the public roots only, so the test CA is unknown
pub fn untrusting_connector() -> Connector {
    connector_with_roots(default_root_store())
}

pub fn acceptor(chain: Vec<CertificateDer<'static>>) -> TlsAcceptor {
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, load_key())
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Serve TLS with `chain` until the handle is dropped, holding each session
/// open until the client goes away
pub async fn spawn_tls_server(
    chain: Vec<CertificateDer<'static>>,
) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = acceptor(chain);

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let mut buf = [0u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
            });
        }
    });

    (addr, handle)
}

/// Accept one connection, optionally write `banner`, then hold it open for `hold`
pub async fn spawn_plain_server(banner: &'static [u8], hold: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = stream.write_all(banner).await;
        tokio::time::sleep(hold).await;
    });

    addr
}

/// A port on which nothing is listening
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub struct SmtpScript {
    pub greeting: &'static str,
    pub helo_reply: &'static str,
    pub starttls_reply: &'static str,
}

impl Default for SmtpScript {
    fn default() -> Self {
        Self {
            greeting: "220 localhost ESMTP test\r\n",
            helo_reply: "250 localhost\r\n",
            starttls_reply: "220 2.0.0 Ready to start TLS\r\n",
        }
    }
}

/// What the scripted SMTP server saw
#[derive(Debug, Default)]
pub struct SmtpTranscript {
    /// Plain-text commands, followed by any line read after the upgrade
    pub commands: Vec<String>,
    pub upgraded: bool,
    /// Bytes received after the server stopped following the script
    pub trailing: Vec<u8>,
}

async fn read_command<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap_or(0);
    line.trim_end().to_string()
}

/// Serve one SMTP session following `script`, upgrading to TLS with `chain`
/// when the STARTTLS reply is positive
pub async fn spawn_smtp_server(
    script: SmtpScript,
    chain: Vec<CertificateDer<'static>>,
) -> (SocketAddr, JoinHandle<SmtpTranscript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = acceptor(chain);

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut transcript = SmtpTranscript::default();

        let steps = [script.greeting, script.helo_reply, script.starttls_reply];
        for (index, reply) in steps.into_iter().enumerate() {
            if index > 0 {
                transcript.commands.push(read_command(&mut reader).await);
            }
            reader.get_mut().write_all(reply.as_bytes()).await.unwrap();

            let expected = if index == 1 { "250" } else { "220" };
            if !reply.starts_with(expected) {
                let _ = reader.read_to_end(&mut transcript.trailing).await;
                return transcript;
            }
        }

        let tls = acceptor.accept(reader.into_inner()).await.unwrap();
        transcript.upgraded = true;

        let mut tls_reader = BufReader::new(tls);
        transcript.commands.push(read_command(&mut tls_reader).await);
        transcript
    });

    (addr, handle)
}

/// Assertions every certificate from a healthy endpoint must satisfy
pub fn assert_healthy_certificate(cert: &CertificateSummary) {
    let now = Utc::now();
    assert!(!cert.is_expired(), "{} is expired", cert.subject);
    assert!(!cert.issuer.is_empty());
    assert!(!cert.subject.is_empty());
    assert!(cert.not_before <= now, "{} is not yet valid", cert.subject);
    assert!(now <= cert.not_after);
    assert!(!cert.serial_number.is_empty());
    assert!(cert.version >= 1);
}
