//! Thin wrapper over a datagram transport: send a datagram, receive one
//! with a bounded wait, and report the local address. Mirrors the
//! `send`/`recv`/`bind` boundary the protocol engines are specified
//! against, so the engines can run against a real `UdpSocket` or, in
//! tests, an in-process channel pair without any other code changing.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::packet::MAX_PACKET_SIZE;

/// A datagram endpoint: send to an address, receive with a timeout.
///
/// `recv_from` returns `Ok(None)` when the timeout elapsed with nothing
/// arriving, distinct from `Err` (a genuine socket failure), so callers can
/// treat "try again" and "give up" differently.
pub trait DatagramEndpoint {
    fn send_to(&self, bytes: &[u8], to: SocketAddr) -> io::Result<()>;
    fn recv_from(&self, timeout: Duration) -> io::Result<Option<(Vec<u8>, SocketAddr)>>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A real UDP/IPv4 socket.
pub struct UdpEndpoint {
    socket: UdpSocket,
}

impl UdpEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(UdpEndpoint { socket })
    }
}

impl DatagramEndpoint for UdpEndpoint {
    fn send_to(&self, bytes: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket.send_to(bytes, to)?;
        Ok(())
    }

    fn recv_from(&self, timeout: Duration) -> io::Result<Option<(Vec<u8>, SocketAddr)>> {
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; MAX_PACKET_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => Ok(Some((buf[..n].to_vec(), from))),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError};
    use std::sync::{Arc, Mutex};

    /// A datagram dropped or corrupted by the test before it reaches its
    /// destination endpoint.
    pub type Hook = Arc<dyn Fn(&mut Vec<u8>) -> bool + Send + Sync>;

    /// An in-process stand-in for two UDP sockets talking to each other,
    /// backed by a pair of `mpsc` channels. `hook` runs on every datagram
    /// sent through this endpoint and returns `false` to drop it.
    pub struct ChannelEndpoint {
        pub local: SocketAddr,
        tx: Sender<(Vec<u8>, SocketAddr)>,
        rx: Mutex<Receiver<(Vec<u8>, SocketAddr)>>,
        hook: Option<Hook>,
    }

    impl ChannelEndpoint {
        /// Builds a connected pair of endpoints at the given (fake)
        /// addresses, with no datagram loss or corruption.
        pub fn pair(a: SocketAddr, b: SocketAddr) -> (ChannelEndpoint, ChannelEndpoint) {
            let (tx_ab, rx_ab) = std::sync::mpsc::channel();
            let (tx_ba, rx_ba) = std::sync::mpsc::channel();

            (
                ChannelEndpoint {
                    local: a,
                    tx: tx_ab,
                    rx: Mutex::new(rx_ba),
                    hook: None,
                },
                ChannelEndpoint {
                    local: b,
                    tx: tx_ba,
                    rx: Mutex::new(rx_ab),
                    hook: None,
                },
            )
        }

        /// Installs a hook run on every outbound datagram; returning
        /// `false` drops it, `true` lets it through (optionally mutated).
        pub fn with_outbound_hook(mut self, hook: Hook) -> Self {
            self.hook = Some(hook);
            self
        }
    }

    impl DatagramEndpoint for ChannelEndpoint {
        fn send_to(&self, bytes: &[u8], _to: SocketAddr) -> io::Result<()> {
            let mut bytes = bytes.to_vec();
            if let Some(hook) = &self.hook {
                if !hook(&mut bytes) {
                    return Ok(());
                }
            }
            let _ = self.tx.send((bytes, self.local));
            Ok(())
        }

        fn recv_from(&self, timeout: Duration) -> io::Result<Option<(Vec<u8>, SocketAddr)>> {
            let rx = self.rx.lock().unwrap();
            match rx.recv_timeout(timeout) {
                Ok(msg) => Ok(Some(msg)),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Ok(None),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Ok(None),
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(self.local)
        }
    }

    /// Drains and discards anything left in `rx` without blocking, used
    /// by tests tearing down a session.
    #[allow(dead_code)]
    pub fn drain(ep: &ChannelEndpoint) {
        let rx = ep.rx.lock().unwrap();
        loop {
            match rx.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}
