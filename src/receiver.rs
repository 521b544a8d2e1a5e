//! Cumulative-ACK receiver: in-order delivery, duplicate/gap handling, and
//! an advertised window derived from free buffer space.

use std::net::SocketAddr;
use std::time::Instant;

use log::{trace, warn};

use crate::config::Config;
use crate::err::Error;
use crate::packet::{Packet, FLAG_ACK};
use crate::socket::DatagramEndpoint;

pub struct Receiver<E: DatagramEndpoint> {
    endpoint: E,
    peer: SocketAddr,
    config: Config,
    expected_seq: u32,
    delivery_buffer: Vec<u8>,
    local_seq: u32,
}

impl<E: DatagramEndpoint> Receiver<E> {
    pub fn from_handshake(
        endpoint: E,
        peer: SocketAddr,
        expected_seq: u32,
        local_seq: u32,
        config: Config,
    ) -> Self {
        Receiver {
            endpoint,
            peer,
            config,
            expected_seq,
            delivery_buffer: Vec::new(),
            local_seq,
        }
    }

    fn available(&self) -> u16 {
        (self.config.max_buffer as usize)
            .saturating_sub(self.delivery_buffer.len())
            .min(u16::MAX as usize) as u16
    }

    /// Blocks, processing inbound segments, until either the peer has been
    /// silent for `receiver_idle` (returning the delivered bytes, or `None`
    /// if nothing was ever delivered) or the socket reports an error.
    pub fn run(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let mut last_activity = Instant::now();

        loop {
            match self.endpoint.recv_from(self.config.recv_poll) {
                Ok(Some((bytes, from))) => {
                    if let Some(pkt) = Packet::deserialize(&bytes) {
                        last_activity = Instant::now();
                        self.handle_segment(pkt, from);
                    } else {
                        trace!("dropped corrupt or undersized datagram");
                    }
                }
                Ok(None) => {}
                Err(e) => return Err(Error::Io(e)),
            }

            if last_activity.elapsed() >= self.config.receiver_idle {
                return Ok(if self.delivery_buffer.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.delivery_buffer))
                });
            }
        }
    }

    /// Processes one already-validated segment: append-and-ACK for the
    /// in-order case, re-ACK for a duplicate or a gap.
    fn handle_segment(&mut self, pkt: Packet, from: SocketAddr) {
        let s = pkt.seq_num;

        if s == self.expected_seq {
            self.delivery_buffer.extend_from_slice(&pkt.data);
            self.send_ack(self.expected_seq, from);
            self.expected_seq = self.expected_seq.wrapping_add(1);
        } else if s < self.expected_seq {
            // Duplicate: observed source behavior re-ACKs the duplicate's
            // own seq rather than `expected_seq - 1`. Harmless — the
            // sender treats any ack_num < base as stale and ignores it.
            trace!("duplicate segment {s}, expected {}", self.expected_seq);
            self.send_ack(s, from);
        } else {
            trace!("out-of-order segment {s}, expected {}", self.expected_seq);
            if self.expected_seq > 0 {
                self.send_ack(self.expected_seq - 1, from);
            }
        }
    }

    fn send_ack(&self, acked: u32, to: SocketAddr) {
        let ack = Packet::new(self.local_seq, acked, self.available(), FLAG_ACK, Vec::new());
        if let Err(e) = self.endpoint.send_to(&ack.serialize(), to) {
            warn!("failed to send ack: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MAX_DATA_SIZE;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn make_receiver<E: DatagramEndpoint>(endpoint: E, peer: SocketAddr) -> Receiver<E> {
        let config = Config {
            receiver_idle: Duration::from_millis(40),
            recv_poll: Duration::from_millis(5),
            ..Config::default()
        };
        Receiver::from_handshake(endpoint, peer, 1, 1, config)
    }

    #[test]
    fn in_order_segment_is_delivered_and_acked() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, peer_ep) = ChannelEndpoint::pair(addr(41001), addr(41002));
        let mut receiver = make_receiver(recv_ep, addr(41002));

        let pkt = Packet::new(1, 0, 0, FLAG_ACK, b"hi".to_vec());
        receiver.handle_segment(pkt, addr(41002));

        assert_eq!(receiver.delivery_buffer, b"hi");
        assert_eq!(receiver.expected_seq, 2);

        let (ack_bytes, _) = peer_ep
            .recv_from(Duration::from_millis(100))
            .unwrap()
            .expect("ack sent");
        let ack = Packet::deserialize(&ack_bytes).unwrap();
        assert_eq!(ack.ack_num, 1);
        assert!(ack.has_flag(FLAG_ACK));
    }

    #[test]
    fn duplicate_segment_re_acks_its_own_seq() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, peer_ep) = ChannelEndpoint::pair(addr(41003), addr(41004));
        let mut receiver = make_receiver(recv_ep, addr(41004));
        receiver.expected_seq = 3;

        let dup = Packet::new(2, 0, 0, FLAG_ACK, b"old".to_vec());
        receiver.handle_segment(dup, addr(41004));

        assert!(receiver.delivery_buffer.is_empty());
        assert_eq!(receiver.expected_seq, 3);

        let (ack_bytes, _) = peer_ep.recv_from(Duration::from_millis(100)).unwrap().unwrap();
        let ack = Packet::deserialize(&ack_bytes).unwrap();
        assert_eq!(ack.ack_num, 2);
    }

    #[test]
    fn gap_discards_and_re_acks_last_in_order() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, peer_ep) = ChannelEndpoint::pair(addr(41005), addr(41006));
        let mut receiver = make_receiver(recv_ep, addr(41006));
        receiver.expected_seq = 2;

        let gap = Packet::new(4, 0, 0, FLAG_ACK, b"future".to_vec());
        receiver.handle_segment(gap, addr(41006));

        assert!(receiver.delivery_buffer.is_empty());
        assert_eq!(receiver.expected_seq, 2);

        let (ack_bytes, _) = peer_ep.recv_from(Duration::from_millis(100)).unwrap().unwrap();
        let ack = Packet::deserialize(&ack_bytes).unwrap();
        assert_eq!(ack.ack_num, 1);
    }

    #[test]
    fn available_window_shrinks_as_buffer_fills() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, _peer_ep) = ChannelEndpoint::pair(addr(41007), addr(41008));
        let mut receiver = make_receiver(recv_ep, addr(41008));
        receiver.config.max_buffer = 10;

        let pkt = Packet::new(1, 0, 0, FLAG_ACK, vec![0u8; 6]);
        receiver.handle_segment(pkt, addr(41008));

        assert_eq!(receiver.available(), 4);
    }

    #[test]
    fn idle_with_data_returns_buffer() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, _peer_ep) = ChannelEndpoint::pair(addr(41009), addr(41010));
        let mut receiver = make_receiver(recv_ep, addr(41010));
        receiver.delivery_buffer = b"leftover".to_vec();

        let result = receiver.run().unwrap();
        assert_eq!(result, Some(b"leftover".to_vec()));
    }

    #[test]
    fn idle_without_data_returns_none() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, _peer_ep) = ChannelEndpoint::pair(addr(41011), addr(41012));
        let mut receiver = make_receiver(recv_ep, addr(41012));

        let result = receiver.run().unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn corrupt_datagram_is_dropped_silently() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, peer_ep) = ChannelEndpoint::pair(addr(41013), addr(41014));
        let mut receiver = make_receiver(recv_ep, addr(41014));

        let mut wire = Packet::new(1, 0, 0, FLAG_ACK, b"x".to_vec()).serialize();
        wire[15] ^= 0xFF; // flip a checksum-covered bit
        peer_ep.send_to(&wire, addr(41013)).unwrap();

        let result = receiver.run().unwrap();
        assert_eq!(result, None);
        assert!(receiver.delivery_buffer.is_empty());
    }

    #[test]
    fn oversized_payload_segment_round_trips_through_buffer() {
        use crate::socket::test_support::ChannelEndpoint;

        let (recv_ep, _peer_ep) = ChannelEndpoint::pair(addr(41015), addr(41016));
        let mut receiver = make_receiver(recv_ep, addr(41016));

        let pkt = Packet::new(1, 0, 0, FLAG_ACK, vec![7u8; MAX_DATA_SIZE]);
        receiver.handle_segment(pkt, addr(41016));

        assert_eq!(receiver.delivery_buffer.len(), MAX_DATA_SIZE);
    }
}
