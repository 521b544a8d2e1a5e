//! AIMD congestion control: slow-start / congestion-avoidance growth on
//! cumulative ACKs, multiplicative decrease on retransmission timeout.
//!
//! `cwnd` and `ssthresh` are kept as `f64` so congestion-avoidance's
//! sub-segment-per-ACK growth isn't lost to integer truncation; callers
//! convert to an integer window only at the point they need a segment
//! count (see `effective_window`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionState {
    SlowStart,
    CongestionAvoidance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionController {
    pub cwnd: f64,
    pub ssthresh: f64,
    pub state: CongestionState,
}

impl CongestionController {
    pub fn new(initial_cwnd: f64, initial_ssthresh: f64) -> Self {
        CongestionController {
            cwnd: initial_cwnd,
            ssthresh: initial_ssthresh,
            state: CongestionState::SlowStart,
        }
    }

    /// Applies the AIMD growth rule for a cumulative ACK covering `k` new
    /// segments.
    pub fn on_ack(&mut self, newly_acked: u32) {
        let k = newly_acked as f64;
        match self.state {
            CongestionState::SlowStart => {
                self.cwnd += k;
                if self.cwnd >= self.ssthresh {
                    self.state = CongestionState::CongestionAvoidance;
                }
            }
            CongestionState::CongestionAvoidance => {
                self.cwnd += k / self.cwnd;
            }
        }
    }

    /// Applies multiplicative decrease on a retransmission timeout and
    /// drops back to slow-start.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(2.0);
        self.cwnd = 1.0;
        self.state = CongestionState::SlowStart;
    }
}

/// The number of segments the sender may have in flight: the minimum of
/// the congestion window, the receiver-advertised window expressed in
/// segments, and the configured hard cap.
pub fn effective_window(cwnd: f64, rwnd_bytes: u32, mss: usize, max_window_segs: u32) -> u32 {
    let cwnd_segs = cwnd.floor().max(1.0) as u32;
    let rwnd_segs = (rwnd_bytes as usize / mss) as u32;
    cwnd_segs.min(rwnd_segs).min(max_window_segs)
}
