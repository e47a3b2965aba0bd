//! UDP transport for the MantelMount MM860.
//!
//! The mount's controller listens on UDP port 81 and speaks a plain-text
//! protocol: a command token terminated with CR (CRLF for a few commands),
//! answered - when it answers at all - by a single reply datagram.
//!
//! Every call opens a fresh datagram endpoint for the duration of that call.
//! A stale reply from an earlier exchange can therefore never be attributed
//! to a later command: the socket it was addressed to is already gone. At a
//! poll period of 100ms or more the per-call setup cost is irrelevant.

use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Default UDP port of the MM860 controller.
pub const DEFAULT_PORT: u16 = 81;

/// Default reply timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Reply datagrams are a single status line; 1 KiB is ample headroom.
const RECV_BUF_SIZE: usize = 1024;

/// Errors that can occur while dispatching a command.
///
/// A reply *timeout* is deliberately not an error: the mount stays silent
/// for many commands, so the absence of a reply is reported as an empty
/// [`MountResponse::raw`] instead.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to open or target the local datagram endpoint.
    #[error("endpoint setup failed: {0}")]
    Endpoint(std::io::Error),

    /// Datagram send or receive failed (e.g. ICMP port unreachable).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw reply to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountResponse {
    /// Command text as sent, without the line terminator.
    pub command: String,
    /// Reply payload, ASCII-decoded and trimmed. Empty when no reply
    /// arrived within the timeout.
    pub raw: String,
}

/// One-shot UDP client for the mount controller.
///
/// Holds only the target address and timeout; all socket state is per-call.
/// Cloning is cheap and clones are fully independent.
#[derive(Debug, Clone)]
pub struct MountClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl MountClient {
    /// Create a client for `host:port` with the given reply timeout.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Per-call reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `command` to the mount, optionally waiting for one reply.
    ///
    /// The payload is the command text plus `\r` (`\r\n` when `crlf` is
    /// set), encoded as single-byte ASCII with non-encodable characters
    /// dropped.
    ///
    /// Timeout policy: endpoint setup and the send itself are local,
    /// non-blocking operations that fail fast, so the configured timeout
    /// bounds the reply wait only and one call's total latency is bounded
    /// by roughly one timeout period. When the wait expires the call
    /// succeeds with an empty [`MountResponse::raw`]; callers treat that as
    /// "no data", not as a protocol error.
    ///
    /// The socket is bound and connected before the datagram leaves, so a
    /// reply cannot race the receive path, and it is released on every exit
    /// path. A straggler reply arriving after the timeout is discarded
    /// along with the socket.
    pub async fn send(
        &self,
        command: &str,
        crlf: bool,
        read_reply: bool,
    ) -> Result<MountResponse, ClientError> {
        let terminator = if crlf { "\r\n" } else { "\r" };
        let payload = encode_ascii(command, terminator);

        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(ClientError::Endpoint)?;
        socket
            .connect((self.host.as_str(), self.port))
            .await
            .map_err(ClientError::Endpoint)?;

        socket.send(&payload).await?;
        debug!("sent UDP to {}:{}: {:?}", self.host, self.port, command);

        let mut raw = String::new();
        if read_reply {
            let mut buf = [0u8; RECV_BUF_SIZE];
            match tokio::time::timeout(self.timeout, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    raw = decode_ascii(&buf[..n]);
                    debug!("received UDP response: {:?}", raw);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!("UDP response timeout for command: {}", command);
                }
            }
        }

        Ok(MountResponse {
            command: command.to_string(),
            raw,
        })
    }
}

/// Encode command text plus terminator as ASCII, dropping anything else.
fn encode_ascii(command: &str, terminator: &str) -> Vec<u8> {
    command
        .chars()
        .chain(terminator.chars())
        .filter(char::is_ascii)
        .map(|c| c as u8)
        .collect()
}

/// Decode a reply datagram as ASCII, dropping non-ASCII bytes and trimming
/// surrounding whitespace.
fn decode_ascii(bytes: &[u8]) -> String {
    let text: String = bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    text.trim().to_string()
}
