//! PRTP — Pipelined Reliable Transfer Protocol: a connection-oriented,
//! reliable byte-stream transport over UDP. Establishes a session with a
//! three-way handshake, frames application bytes into sequenced segments,
//! retransmits losses with Go-Back-N, adapts its send rate with AIMD
//! congestion control, and respects a receiver-advertised flow-control
//! window.

pub mod config;
pub mod congestion;
pub mod err;
pub mod handshake;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod socket;

pub use config::Config;
pub use congestion::{CongestionController, CongestionState};
pub use err::Error;
pub use packet::Packet;
pub use receiver::Receiver;
pub use sender::Sender;
pub use socket::{DatagramEndpoint, UdpEndpoint};

use std::net::SocketAddr;
use std::sync::Arc;

/// Runs the client side of a session end to end: handshake, then a single
/// `send_data` call. Used by the `client` binary; exposed here so it is
/// independently testable against an arbitrary `DatagramEndpoint`.
pub fn run_client_session<E: DatagramEndpoint + Send + Sync + 'static>(
    endpoint: Arc<E>,
    peer: SocketAddr,
    config: Config,
    data: &[u8],
) -> Result<Sender<E>, Error> {
    let hs = handshake::connect(endpoint.as_ref(), peer, &config)?;
    let sender = Sender::from_handshake(endpoint, peer, hs.base_seq, hs.rwnd_bytes, config);
    sender.send(data)?;
    Ok(sender)
}

/// Runs one server-side session end to end: accept a handshake, then
/// receive until the peer goes idle. Used by the `server` binary's
/// accept-one-session-at-a-time loop.
pub fn run_server_session<E: DatagramEndpoint>(
    endpoint: E,
    config: Config,
) -> Result<Option<Vec<u8>>, Error> {
    let available = config.max_buffer;
    let hs = handshake::accept(&endpoint, available, &config)?;
    let mut receiver =
        Receiver::from_handshake(endpoint, hs.peer, hs.expected_seq, hs.local_seq, config);
    receiver.run()
}
