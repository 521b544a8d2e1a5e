//! Three-way handshake: client (initiator) and server (responder) sides.
//! Neither side retries internally on failure — the caller retries the
//! whole session.

use std::net::SocketAddr;
use std::time::Instant;

use log::{info, warn};

use crate::config::Config;
use crate::err::Error;
use crate::packet::{Packet, FLAG_ACK, FLAG_SYN};
use crate::socket::DatagramEndpoint;

/// What the client learns from a successful handshake: the sequence
/// number its sender engine should use as `base`/`next_seq`, and the
/// server's initial advertised window.
pub struct ClientHandshake {
    pub base_seq: u32,
    pub rwnd_bytes: u32,
}

/// What the server learns from a successful handshake: the client's
/// address and the sequence number its receiver engine should expect
/// next.
pub struct ServerHandshake {
    pub peer: SocketAddr,
    pub expected_seq: u32,
    /// The client ACK's own `seq_num`, carried forward as the receiver's
    /// `local_seq` for every outbound ACK it sends during the data phase.
    pub local_seq: u32,
}

/// Client side of the handshake: SYN -> await SYN+ACK -> ACK.
///
/// A timeout or a corrupt/unflagged reply fails the handshake outright;
/// there is no retry loop here.
pub fn connect<E: DatagramEndpoint>(
    endpoint: &E,
    peer: SocketAddr,
    config: &Config,
) -> Result<ClientHandshake, Error> {
    let syn = Packet::new(0, 0, 0, FLAG_SYN, Vec::new());
    endpoint.send_to(&syn.serialize(), peer)?;
    info!("handshake: sent SYN to {peer}");

    let (bytes, _from) = match endpoint.recv_from(config.handshake_timeout)? {
        Some(msg) => msg,
        None => return Err(Error::HandshakeTimeout(peer)),
    };

    let reply = Packet::deserialize(&bytes).ok_or(Error::HandshakeFailed("corrupt reply"))?;
    if !reply.has_flag(FLAG_SYN) || !reply.has_flag(FLAG_ACK) {
        return Err(Error::HandshakeFailed("expected SYN+ACK"));
    }
    info!(
        "handshake: received SYN+ACK (seq={}, ack={})",
        reply.seq_num, reply.ack_num
    );

    // A zero-advertised window is indistinguishable from "never
    // advertised"; map it to the default so a server that sent no real
    // window doesn't stall the session from the first byte.
    let rwnd_bytes = if reply.window_size == 0 {
        65535
    } else {
        reply.window_size as u32
    };

    let ack = Packet::new(reply.ack_num, reply.seq_num.wrapping_add(1), 0, FLAG_ACK, Vec::new());
    endpoint.send_to(&ack.serialize(), peer)?;
    info!(
        "handshake: sent ACK (seq={}, ack={}), connected",
        ack.seq_num, ack.ack_num
    );

    Ok(ClientHandshake {
        base_seq: ack.seq_num,
        rwnd_bytes,
    })
}

/// Server side of the handshake: await SYN -> SYN+ACK -> await ACK.
///
/// A corrupt or absent ACK restarts the wait from the beginning (a fresh
/// SYN), rather than failing the whole `accept` call — a client that never
/// hears the SYN+ACK will simply resend its SYN and try again.
pub fn accept<E: DatagramEndpoint>(
    endpoint: &E,
    available: u16,
    config: &Config,
) -> Result<ServerHandshake, Error> {
    loop {
        let (peer, syn) = loop {
            let Some((bytes, from)) = endpoint.recv_from(config.recv_poll)? else {
                continue;
            };
            let Some(pkt) = Packet::deserialize(&bytes) else {
                continue;
            };
            if !pkt.has_flag(FLAG_SYN) {
                continue;
            }
            break (from, pkt);
        };
        info!("handshake: received SYN from {peer}");

        let synack = Packet::new(0, syn.seq_num.wrapping_add(1), available, FLAG_SYN | FLAG_ACK, Vec::new());
        endpoint.send_to(&synack.serialize(), peer)?;
        info!(
            "handshake: sent SYN+ACK (seq=0, ack={}, window={available})",
            synack.ack_num
        );

        let deadline = Instant::now() + config.handshake_timeout;
        let ack = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break None;
            }
            match endpoint.recv_from(remaining.min(config.recv_poll))? {
                Some((bytes, from)) if from == peer => match Packet::deserialize(&bytes) {
                    Some(pkt) if pkt.has_flag(FLAG_ACK) => break Some(pkt),
                    _ => continue,
                },
                _ => continue,
            }
        };

        match ack {
            Some(ack) => {
                info!("handshake: received ACK, connected to {peer}");
                return Ok(ServerHandshake {
                    peer,
                    expected_seq: ack.ack_num,
                    local_seq: ack.seq_num,
                });
            }
            None => {
                warn!("handshake: no valid ACK from {peer}, waiting for a fresh SYN");
                continue;
            }
        }
    }
}
