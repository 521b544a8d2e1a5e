use std::io;
use std::net::SocketAddr;

/// Failures that can cross an API boundary.
///
/// Protocol-level non-events (corrupt frames, duplicate ACKs, out-of-order
/// data) are not represented here; they are silently dropped or answered
/// with a duplicate ACK per the receiver/sender policy, never surfaced as
/// an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    #[error("session is not connected")]
    NotConnected,
}
