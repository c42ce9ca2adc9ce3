use super::{
    CertificateSummary, ConnectorConfig, ProtocolMode, Session, SessionSummary, ValidationOutcome,
    starttls,
    verifier::{CapturedHandshake, CapturingVerifier},
};
use crate::error::RetrieveError;
use anyhow::{Result, anyhow};
use rustls::{
    ClientConfig, ProtocolVersion,
    crypto::{CryptoProvider, ring::default_provider},
    pki_types::ServerName,
};
use std::{
    io,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{
    net::{TcpSocket, TcpStream, lookup_host},
    time::timeout,
};
use tokio_rustls::{TlsConnector, client::TlsStream};

const SOCKET_BUFFER_SIZE: u32 = 4096;

// (suite name fragment, algorithm, key bits)
const BULK_CIPHERS: [(&str, &str, u16); 3] = [
    ("AES_256_GCM", "AES-256-GCM", 256),
    ("AES_128_GCM", "AES-128-GCM", 128),
    ("CHACHA20_POLY1305", "CHACHA20-POLY1305", 256),
];

/// Opens connections, performs the handshake and summarises what the peer presented
#[derive(Debug, Clone)]
pub struct Connector {
    config: ConnectorConfig,
    provider: Arc<CryptoProvider>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new(ConnectorConfig::default())
    }
}

impl Connector {
    #[must_use]
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            provider: Arc::new(default_provider()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Connect to `host:port`, upgrade to TLS as `mode` requires and summarise the session
    ///
    /// Every network, negotiation and handshake failure is returned as
    /// [`SessionSummary::Failure`]. Calls are independent and may run concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::InvalidArgument`] if `host` is empty or whitespace and
    /// [`RetrieveError::OutOfRange`] if `port` is outside `1..=65535`. No I/O is
    /// performed in either case.
    pub async fn retrieve(
        &self,
        host: &str,
        port: i32,
        mode: ProtocolMode,
    ) -> Result<SessionSummary, RetrieveError> {
        let port = validate(host, port)?;

        log::debug!("inspecting {host}:{port} ({mode})");
        let summary = self.attempt(host, port, mode).await;

        match &summary {
            SessionSummary::Success(session) => log::info!(
                "{host}:{port} negotiated {} {} ({})",
                session.protocol,
                session.cipher_suite,
                session.validation
            ),
            SessionSummary::Failure { error } => log::info!("{host}:{port} failed: {error}"),
        }

        Ok(summary)
    }

    async fn attempt(&self, host: &str, port: u16, mode: ProtocolMode) -> SessionSummary {
        let mut stream = match self.open_transport(host, port).await {
            Ok(stream) => stream,
            Err(e) => return SessionSummary::failure(e.to_string()),
        };

        if stream.peer_addr().is_err() {
            return SessionSummary::failure(format!("Could not establish connection with {host}"));
        }

        if mode.is_opportunistic()
            && let Err(e) = starttls::negotiate(&mut stream, self.config.io_timeout).await
        {
            return SessionSummary::failure(e.to_string());
        }

        // Fresh per attempt: the capture must never be visible to another call
        let verifier = Arc::new(CapturingVerifier::new(
            Arc::clone(&self.config.roots),
            Arc::clone(&self.provider),
        ));

        let mut tls_stream = match self.handshake(host, stream, Arc::clone(&verifier)).await {
            Ok(tls_stream) => tls_stream,
            Err(e) => return SessionSummary::failure(e.to_string()),
        };

        let summary = summarize(&tls_stream, verifier.take_captured());

        if mode.is_opportunistic()
            && let Err(e) = starttls::quit(&mut tls_stream, self.config.io_timeout).await
        {
            log::debug!("QUIT to {host} failed: {e}");
        }

        summary
    }

    /// Resolve `host` and connect to the first address that accepts
    async fn open_transport(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> =
            timeout(self.config.connect_timeout, lookup_host((host, port)))
                .await
                .map_err(|_| timed_out("resolving", host, self.config.connect_timeout))??
                .collect();

        let mut last_error = None;
        for addr in addrs {
            log::debug!("connecting to {addr}");
            match self.connect_addr(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    log::debug!("connection to {addr} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {host}"),
            )
        }))
    }

    async fn connect_addr(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;

        let stream = timeout(self.config.connect_timeout, socket.connect(addr))
            .await
            .map_err(|_| {
                timed_out("connecting to", &addr.to_string(), self.config.connect_timeout)
            })??;
        stream.set_nodelay(true)?;

        Ok(stream)
    }

    async fn handshake(
        &self,
        host: &str,
        stream: TcpStream,
        verifier: Arc<CapturingVerifier>,
    ) -> io::Result<TlsStream<TcpStream>> {
        let server_name = server_name_from_host(host)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let config = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(io::Error::other)?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(config));
        timeout(
            self.config.handshake_timeout,
            connector.connect(server_name, stream),
        )
        .await
        .map_err(|_| timed_out("TLS handshake with", host, self.config.handshake_timeout))?
    }
}

/// Inspect `host:port` with the default configuration
///
/// # Errors
///
/// Returns an error under the same conditions as [`Connector::retrieve`]
pub async fn retrieve(
    host: &str,
    port: i32,
    mode: ProtocolMode,
) -> Result<SessionSummary, RetrieveError> {
    Connector::default().retrieve(host, port, mode).await
}

fn validate(host: &str, port: i32) -> Result<u16, RetrieveError> {
    if host.trim().is_empty() {
        return Err(RetrieveError::InvalidArgument { field: "host" });
    }

    u16::try_from(port)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| RetrieveError::OutOfRange {
            field: "port",
            value: port.to_string(),
            expected: "between 1 and 65535".to_string(),
        })
}

fn timed_out(action: &str, target: &str, after: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{action} {target} timed out after {}ms", after.as_millis()),
    )
}

fn server_name_from_host(host: &str) -> Result<ServerName<'static>> {
    host.parse::<IpAddr>().map_or_else(
        |_| {
            ServerName::try_from(host.to_string())
                .map_err(|_| anyhow!("invalid server name: {host}"))
        },
        |ip| Ok(ServerName::from(ip)),
    )
}

fn summarize(stream: &TlsStream<TcpStream>, captured: Option<CapturedHandshake>) -> SessionSummary {
    let (_, connection) = stream.get_ref();

    let cipher_suite = connection
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()))
        .unwrap_or_default();
    let (cipher_algorithm, cipher_strength) = bulk_cipher(&cipher_suite);
    let protocol = connection
        .protocol_version()
        .map(protocol_name)
        .unwrap_or_default();

    let captured = captured.unwrap_or_else(|| CapturedHandshake {
        chain: Vec::new(),
        outcome: ValidationOutcome::ChainErrors,
        errors: vec!["no certificate was captured during the handshake".to_string()],
    });

    let mut parsed = captured.chain.iter().map(|der| {
        CertificateSummary::from_der(der)
            .inspect_err(|e| log::warn!("skipping certificate in chain: {e}"))
            .ok()
    });
    let certificate = parsed.next().flatten();
    let chain = certificate.iter().cloned().chain(parsed.flatten()).collect();

    SessionSummary::Success(Session {
        cipher_suite,
        cipher_algorithm,
        cipher_strength,
        protocol,
        validation: captured.outcome,
        validation_errors: captured.errors,
        certificate,
        chain,
    })
}

fn bulk_cipher(suite: &str) -> (String, u16) {
    BULK_CIPHERS
        .iter()
        .find(|(fragment, _, _)| suite.contains(fragment))
        .map_or_else(
            || ("unknown".to_string(), 0),
            |(_, algorithm, bits)| ((*algorithm).to_string(), *bits),
        )
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        other => format!("{other:?}"),
    }
}
