//! Wire format for PRTP segments: a fixed 20-byte header followed by up to
//! 1024 bytes of payload, protected by an Internet-style one's-complement
//! checksum over the whole packet.

/// Size of the fixed header, in bytes.
pub const HEADER_SIZE: usize = 20;
/// Maximum payload a single segment may carry.
pub const MAX_DATA_SIZE: usize = 1024;
/// Largest possible datagram this protocol ever produces.
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_DATA_SIZE;

pub const FLAG_SYN: u8 = 0x01;
pub const FLAG_ACK: u8 = 0x02;
pub const FLAG_FIN: u8 = 0x04;
pub const FLAG_RST: u8 = 0x08;

/// A parsed PRTP segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq_num: u32,
    pub ack_num: u32,
    pub window_size: u16,
    pub flags: u8,
    pub timestamp: u32,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(seq_num: u32, ack_num: u32, window_size: u16, flags: u8, data: Vec<u8>) -> Self {
        Packet {
            seq_num,
            ack_num,
            window_size,
            flags,
            timestamp: now_millis(),
            data,
        }
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Packs the header and payload into a single buffer, big-endian, with
    /// the checksum field computed over the whole packet (checksum field
    /// zeroed during that computation).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.data.len());
        write_header(&mut buf, self, 0);
        buf.extend_from_slice(&self.data);

        let sum = internet_checksum(&buf);
        buf[10] = (sum >> 8) as u8;
        buf[11] = (sum & 0xFF) as u8;
        buf
    }

    /// Parses a datagram into a packet, rejecting anything shorter than
    /// the header or whose checksum does not match. There is no partial
    /// acceptance: a rejected packet yields `None`, not a best-effort
    /// parse.
    pub fn deserialize(bytes: &[u8]) -> Option<Packet> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }

        let on_wire_checksum = u16::from_be_bytes([bytes[10], bytes[11]]);

        let mut zeroed = bytes.to_vec();
        zeroed[10] = 0;
        zeroed[11] = 0;
        if internet_checksum(&zeroed) != on_wire_checksum {
            return None;
        }

        let seq_num = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let ack_num = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        let window_size = u16::from_be_bytes([bytes[8], bytes[9]]);
        let flags = bytes[12];
        let timestamp = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
        let data = bytes[HEADER_SIZE..].to_vec();

        Some(Packet {
            seq_num,
            ack_num,
            window_size,
            flags,
            timestamp,
            data,
        })
    }
}

/// Writes the 20-byte header (checksum field set to `checksum`) to `buf`.
fn write_header(buf: &mut Vec<u8>, pkt: &Packet, checksum: u16) {
    buf.extend_from_slice(&pkt.seq_num.to_be_bytes());
    buf.extend_from_slice(&pkt.ack_num.to_be_bytes());
    buf.extend_from_slice(&pkt.window_size.to_be_bytes());
    buf.extend_from_slice(&checksum.to_be_bytes());
    buf.push(pkt.flags);
    buf.extend_from_slice(&[0u8; 3]); // reserved
    buf.extend_from_slice(&pkt.timestamp.to_be_bytes());
}

/// 16-bit one's-complement Internet checksum over `bytes`, with carries
/// folded after each addition.
fn internet_checksum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = bytes.chunks_exact(2);
    for pair in &mut chunks {
        let word = u16::from_be_bytes([pair[0], pair[1]]) as u32;
        sum += word;
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    if let [last] = chunks.remainder() {
        let word = (*last as u32) << 8;
        sum += word;
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    (!sum & 0xFFFF) as u16
}

fn now_millis() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}
