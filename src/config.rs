use std::time::Duration;

/// Every tunable the protocol engines read, collected in one place so a
/// caller (or a test) can override individual values without reaching into
/// engine internals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Maximum application bytes per segment.
    pub mss: usize,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Initial congestion window, in segments.
    pub initial_cwnd: f64,
    /// Initial slow-start threshold, in segments.
    pub initial_ssthresh: f64,
    /// Receiver delivery buffer capacity, in bytes.
    pub max_buffer: u16,
    /// Hard cap on in-flight segments, independent of cwnd/rwnd.
    pub max_window_segs: u32,
    /// How long the client waits for SYN+ACK / the server waits for ACK.
    pub handshake_timeout: Duration,
    /// How long the receiver waits for any valid datagram before ending
    /// the session.
    pub receiver_idle: Duration,
    /// Socket read timeout used while polling for inbound datagrams.
    pub recv_poll: Duration,
    /// Sleep between window-fill passes in the sender's progress loop.
    pub send_poll: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mss: 1024,
            rto: Duration::from_secs_f64(2.0),
            initial_cwnd: 1.0,
            initial_ssthresh: 16.0,
            max_buffer: 65535,
            max_window_segs: 64,
            handshake_timeout: Duration::from_secs_f64(5.0),
            receiver_idle: Duration::from_secs(30),
            recv_poll: Duration::from_secs_f64(0.1),
            send_poll: Duration::from_secs_f64(0.01),
        }
    }
}
