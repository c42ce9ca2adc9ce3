//! SMTP STARTTLS negotiation
//!
//! The exchange is modelled as a small state machine so it can be driven by any
//! byte stream: a `TcpStream` in production, an in-memory duplex in tests.
//!
//! ```text
//! AwaitGreeting --220--> AwaitHelloAck --250--> AwaitUpgradeAck --220--> Upgraded
//!       |                      |                       |
//!       +--------other---------+---------other---------+--> Failed(step)
//! ```

use std::{fmt, io, time::Duration};
use thiserror::Error;
use tokio::{
    io::{
        AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
        BufReader,
    },
    time::timeout,
};

const SERVICE_READY: &str = "220";
const COMPLETED: &str = "250";

pub const HELO_COMMAND: &str = "HELO there";
pub const STARTTLS_COMMAND: &str = "STARTTLS";
pub const QUIT_COMMAND: &str = "QUIT";

const MAX_REPLY_LINE: u64 = 4096;

/// The client action a server reply answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    Helo,
    StartTls,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "CONNECT",
            Self::Helo => "HELO",
            Self::StartTls => "STARTTLS",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    AwaitGreeting,
    AwaitHelloAck,
    AwaitUpgradeAck,
    Upgraded,
    Failed(Step),
}

impl NegotiationState {
    /// Feed one server reply, returning the next state and the command to send, if any
    #[must_use]
    pub fn on_reply(self, reply: &str) -> (Self, Option<&'static str>) {
        match self {
            Self::AwaitGreeting if reply.starts_with(SERVICE_READY) => {
                (Self::AwaitHelloAck, Some(HELO_COMMAND))
            }
            Self::AwaitHelloAck if reply.starts_with(COMPLETED) => {
                (Self::AwaitUpgradeAck, Some(STARTTLS_COMMAND))
            }
            Self::AwaitUpgradeAck if reply.starts_with(SERVICE_READY) => (Self::Upgraded, None),
            Self::AwaitGreeting => (Self::Failed(Step::Connect), None),
            Self::AwaitHelloAck => (Self::Failed(Step::Helo), None),
            Self::AwaitUpgradeAck => (Self::Failed(Step::StartTls), None),
            Self::Upgraded | Self::Failed(_) => (self, None),
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Upgraded | Self::Failed(_))
    }
}

#[derive(Error, Debug)]
pub enum StartTlsError {
    #[error("SMTP server did not respond to {0} command.")]
    Rejected(Step),

    #[error("timed out waiting for SMTP server after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("SMTP server sent unexpected data before the TLS handshake")]
    UnexpectedData,

    #[error("SMTP server sent a reply line longer than 4096 bytes")]
    ReplyTooLong,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Run the plain-text exchange up to the point where the TLS handshake may start
///
/// On success no byte past the final `220` reply has been consumed from `stream`.
///
/// # Errors
///
/// Returns an error if a reply does not carry the expected status, the server
/// goes silent for longer than `io_timeout`, sends data past the STARTTLS
/// acknowledgement, or the stream fails
pub async fn negotiate<S>(stream: &mut S, io_timeout: Duration) -> Result<(), StartTlsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut state = NegotiationState::AwaitGreeting;

    while !state.is_terminal() {
        let reply = read_reply(&mut reader, io_timeout).await?;
        log::debug!("SMTP <- {reply}");

        let (next, command) = state.on_reply(&reply);
        if let Some(command) = command {
            log::debug!("SMTP -> {command}");
            write_line(reader.get_mut(), command, io_timeout).await?;
        }
        state = next;
    }

    if let NegotiationState::Failed(step) = state {
        return Err(StartTlsError::Rejected(step));
    }

    if !reader.buffer().is_empty() {
        return Err(StartTlsError::UnexpectedData);
    }

    Ok(())
}

/// Send `QUIT` and close the write half
///
/// # Errors
///
/// Returns an error if the write or shutdown fails or times out
pub async fn quit<S>(stream: &mut S, io_timeout: Duration) -> Result<(), StartTlsError>
where
    S: AsyncWrite + Unpin,
{
    write_line(stream, QUIT_COMMAND, io_timeout).await?;
    timeout(io_timeout, stream.shutdown())
        .await
        .map_err(|_| StartTlsError::Timeout(io_timeout))??;
    Ok(())
}

async fn write_line<W>(
    writer: &mut W,
    command: &str,
    io_timeout: Duration,
) -> Result<(), StartTlsError>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{command}\r\n");
    timeout(io_timeout, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| StartTlsError::Timeout(io_timeout))??;
    Ok(())
}

/// Read a complete reply, skipping `NNN-` continuation lines
///
/// Returns an empty string at end of stream. A line that reaches
/// `MAX_REPLY_LINE` bytes without a terminator is rejected rather than split.
async fn read_reply<R>(reader: &mut R, io_timeout: Duration) -> Result<String, StartTlsError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        let read = timeout(
            io_timeout,
            (&mut *reader).take(MAX_REPLY_LINE).read_line(&mut line),
        )
        .await
        .map_err(|_| StartTlsError::Timeout(io_timeout))??;

        if read == 0 {
            return Ok(String::new());
        }

        let at_limit = u64::try_from(read).is_ok_and(|read| read >= MAX_REPLY_LINE);
        if at_limit && !line.ends_with('\n') {
            return Err(StartTlsError::ReplyTooLong);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if !is_continuation(line) {
            return Ok(line.to_string());
        }
        log::trace!("SMTP <- {line}");
    }
}

fn is_continuation(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.get(3) == Some(&b'-') && bytes.iter().take(3).all(u8::is_ascii_digit)
}
