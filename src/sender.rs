//! Go-Back-N sliding-window sender with a single retransmission timer and
//! AIMD congestion control, driven from two concurrent contexts sharing one
//! mutex-guarded state record: the caller's progress loop (`Sender::send`)
//! and a background thread draining ACKs.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, trace, warn};

use crate::config::Config;
use crate::congestion::{effective_window, CongestionController, CongestionState};
use crate::err::Error;
use crate::packet::{Packet, FLAG_ACK};
use crate::socket::DatagramEndpoint;

struct SenderState {
    base: u32,
    next_seq: u32,
    send_buffer: BTreeMap<u32, (Packet, Instant)>,
    congestion: CongestionController,
    rwnd_bytes: u32,
    timer: Option<Instant>,
}

impl SenderState {
    fn timer_invariant_holds(&self) -> bool {
        self.timer.is_some() == (self.base < self.next_seq)
    }
}

/// A single PRTP sending session. Holds the ACK-receive background thread
/// and joins it on drop.
pub struct Sender<E: DatagramEndpoint + Send + Sync + 'static> {
    state: Arc<Mutex<SenderState>>,
    endpoint: Arc<E>,
    peer: SocketAddr,
    config: Config,
    running: Arc<AtomicBool>,
    ack_thread: Option<JoinHandle<()>>,
}

impl<E: DatagramEndpoint + Send + Sync + 'static> Sender<E> {
    /// Builds a sender from the sequence numbers and advertised window the
    /// handshake negotiated, and starts the ACK-receive background thread.
    pub fn from_handshake(
        endpoint: Arc<E>,
        peer: SocketAddr,
        base_seq: u32,
        rwnd_bytes: u32,
        config: Config,
    ) -> Self {
        let state = Arc::new(Mutex::new(SenderState {
            base: base_seq,
            next_seq: base_seq,
            send_buffer: BTreeMap::new(),
            congestion: CongestionController::new(config.initial_cwnd, config.initial_ssthresh),
            rwnd_bytes,
            timer: None,
        }));
        let running = Arc::new(AtomicBool::new(true));

        let ack_thread = {
            let state = state.clone();
            let endpoint = endpoint.clone();
            let running = running.clone();
            thread::spawn(move || ack_loop(state, endpoint, running, config))
        };

        Sender {
            state,
            endpoint,
            peer,
            config,
            running,
            ack_thread: Some(ack_thread),
        }
    }

    /// Splits `data` into MSS-sized segments, assigns them consecutive
    /// sequence numbers starting at the current `base`, and drives the
    /// Go-Back-N window until every segment is acknowledged.
    pub fn send(&self, data: &[u8]) -> Result<usize, Error> {
        let chunks: Vec<Vec<u8>> = data
            .chunks(self.config.mss.max(1))
            .map(|c| c.to_vec())
            .collect();
        let total = chunks.len() as u32;
        let start_seq = self.state.lock().unwrap().base;
        let end_seq = start_seq.wrapping_add(total);

        debug!(
            "sending {} bytes as {} segment(s), starting at seq {start_seq}",
            data.len(),
            total
        );

        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.base == end_seq {
                    break;
                }

                let w = effective_window(
                    state.congestion.cwnd,
                    state.rwnd_bytes,
                    self.config.mss,
                    self.config.max_window_segs,
                );

                while state.next_seq < end_seq && state.next_seq < state.base.wrapping_add(w) {
                    let idx = (state.next_seq - start_seq) as usize;
                    let pkt = Packet::new(state.next_seq, 0, 0, FLAG_ACK, chunks[idx].clone());
                    let wire = pkt.serialize();

                    self.endpoint.send_to(&wire, self.peer)?;

                    let first_in_flight = state.base == state.next_seq;
                    let seq = state.next_seq;
                    state.send_buffer.insert(seq, (pkt, Instant::now()));
                    if first_in_flight {
                        state.timer = Some(Instant::now());
                    }
                    state.next_seq = state.next_seq.wrapping_add(1);

                    trace!("sent segment {seq} (cwnd={:.2})", state.congestion.cwnd);
                }

                debug_assert!(state.timer_invariant_holds());
            }

            thread::sleep(self.config.send_poll);

            {
                let mut state = self.state.lock().unwrap();
                let timed_out = state
                    .timer
                    .map(|start| start.elapsed() >= self.config.rto)
                    .unwrap_or(false);

                if timed_out && state.base < end_seq {
                    warn!(
                        "retransmission timeout, go-back-n from seq {}",
                        state.base
                    );
                    for seq in state.base..state.next_seq {
                        if let Some((pkt, sent_at)) = state.send_buffer.get_mut(&seq) {
                            let wire = pkt.serialize();
                            self.endpoint.send_to(&wire, self.peer)?;
                            *sent_at = Instant::now();
                        }
                    }
                    state.congestion.on_timeout();
                    state.timer = Some(Instant::now());
                }
            }
        }

        debug!(
            "all {total} segment(s) acknowledged, final cwnd={:.2}",
            self.cwnd()
        );
        Ok(data.len())
    }

    pub fn cwnd(&self) -> f64 {
        self.state.lock().unwrap().congestion.cwnd
    }

    pub fn congestion_state(&self) -> CongestionState {
        self.state.lock().unwrap().congestion.state
    }

    /// Stops the ACK-receive thread and joins it. Idempotent.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(jh) = self.ack_thread.take() {
            let _ = jh.join();
        }
    }
}

impl<E: DatagramEndpoint + Send + Sync + 'static> Drop for Sender<E> {
    fn drop(&mut self) {
        self.close();
    }
}

fn ack_loop<E: DatagramEndpoint>(
    state: Arc<Mutex<SenderState>>,
    endpoint: Arc<E>,
    running: Arc<AtomicBool>,
    config: Config,
) {
    while running.load(Ordering::Acquire) {
        match endpoint.recv_from(config.recv_poll) {
            Ok(Some((bytes, _from))) => {
                if let Some(pkt) = Packet::deserialize(&bytes) {
                    if pkt.has_flag(FLAG_ACK) {
                        handle_ack(&state, pkt);
                    }
                }
            }
            Ok(None) => continue,
            Err(e) => {
                warn!("ack receive: socket error: {e}");
                continue;
            }
        }
    }
}

/// Cumulative-ACK processing: removes everything in `[base, ack_num]` from
/// the retransmission buffer, updates the advertised window and congestion
/// window, and slides `base` forward. ACKs with `ack_num < base` are stale
/// and ignored.
fn handle_ack(state: &Mutex<SenderState>, pkt: Packet) {
    let mut state = state.lock().unwrap();

    if pkt.ack_num < state.base {
        trace!("ignoring stale ack {}", pkt.ack_num);
        return;
    }

    let newly_acked = pkt.ack_num - state.base + 1;
    for seq in state.base..=pkt.ack_num {
        state.send_buffer.remove(&seq);
    }

    state.rwnd_bytes = if pkt.window_size == 0 {
        65535
    } else {
        pkt.window_size as u32
    };

    state.congestion.on_ack(newly_acked);
    state.base = pkt.ack_num.wrapping_add(1);

    if state.base < state.next_seq {
        state.timer = Some(Instant::now());
    } else {
        state.timer = None;
    }

    debug_assert!(state.timer_invariant_holds());
}
