//! Raw IPv4+UDP datagram construction for the relay stream.
//!
//! The relay spoofs its source endpoint, so the kernel cannot build the
//! headers for us: every datagram carries a hand-assembled IPv4 header and
//! UDP header in front of the unmodified record bytes, sent through a raw
//! socket with header inclusion enabled. Encoding is a pure transformation
//! into a caller-owned buffer, which keeps it unit-testable without sockets
//! or privileges.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::checksum::{internet_checksum, udp_checksum};
use crate::{Result, StreamError};

/// Size of the IPv4 header we emit (no options, IHL = 5).
pub const IPV4_HEADER_LEN: usize = 20;
/// Size of the UDP header.
pub const UDP_HEADER_LEN: usize = 8;
/// Size of the UDP pseudo-header used for checksum computation.
const PSEUDO_HEADER_LEN: usize = 12;
/// Fixed capacity of the packet assembly buffer.
pub const PACKET_BUFFER_SIZE: usize = 256;

/// IP protocol number for UDP.
const IPPROTO_UDP: u8 = 17;

/// An IPv4 address plus UDP port.
///
/// Two instances exist per relay: the spoofed sender identity of this device
/// and the remote collector. Both are fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEndpoint {
    /// IPv4 address.
    pub addr: Ipv4Addr,
    /// UDP port.
    pub port: u16,
}

impl RelayEndpoint {
    /// Create an endpoint from address and port.
    pub fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Total datagram length for a given payload size.
pub fn datagram_len(payload_len: usize) -> usize {
    IPV4_HEADER_LEN + UDP_HEADER_LEN + payload_len
}

/// Builds spoofed IPv4+UDP datagrams into a fixed internal buffer.
///
/// Constructed once at startup for a fixed payload size; construction fails
/// when headers plus payload cannot fit the packet buffer, which is a
/// build/configuration mismatch and must never surface as a per-packet
/// runtime error.
pub struct RawUdpEncoder {
    source: RelayEndpoint,
    target: RelayEndpoint,
    payload_len: usize,
    buf: [u8; PACKET_BUFFER_SIZE],
    // scratch area for the pseudo-header + UDP segment checksum pass
    pseudogram: [u8; PSEUDO_HEADER_LEN + PACKET_BUFFER_SIZE],
}

impl RawUdpEncoder {
    /// Create an encoder for datagrams carrying `payload_len`-byte records
    /// from `source` (spoofed) to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::EncodeCapacity`] when the encoded datagram
    /// would exceed the packet buffer.
    pub fn new(source: RelayEndpoint, target: RelayEndpoint, payload_len: usize) -> Result<Self> {
        let needed = datagram_len(payload_len);
        if needed > PACKET_BUFFER_SIZE {
            return Err(StreamError::EncodeCapacity { needed, capacity: PACKET_BUFFER_SIZE });
        }
        Ok(Self {
            source,
            target,
            payload_len,
            buf: [0u8; PACKET_BUFFER_SIZE],
            pseudogram: [0u8; PSEUDO_HEADER_LEN + PACKET_BUFFER_SIZE],
        })
    }

    /// The spoofed sender endpoint.
    pub fn source(&self) -> RelayEndpoint {
        self.source
    }

    /// The collector endpoint.
    pub fn target(&self) -> RelayEndpoint {
        self.target
    }

    /// Encode one datagram: IPv4 header, UDP header, then `payload`
    /// unmodified. Returns the encoded bytes, valid until the next call.
    ///
    /// `ip_id` is truncated to 16 bits and placed in the IP identification
    /// field.
    ///
    /// # Errors
    ///
    /// Returns a decode error when `payload` does not match the length the
    /// encoder was constructed for. The reader loop only passes size-checked
    /// records, so this does not occur in production.
    pub fn encode(&mut self, payload: &[u8], ip_id: u32) -> Result<&[u8]> {
        if payload.len() != self.payload_len {
            return Err(StreamError::decode_error(
                "relay payload",
                format!("expected {} bytes, got {}", self.payload_len, payload.len()),
            ));
        }

        let total_len = datagram_len(payload.len());
        let udp_len = UDP_HEADER_LEN + payload.len();
        let buf = &mut self.buf[..total_len];
        buf.fill(0);

        // IPv4 header, RFC 791. Checksum covers the header only, computed
        // with the checksum field zeroed.
        buf[0] = 0x45; // version 4, IHL 5
        buf[1] = 0; // TOS
        buf[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
        buf[4..6].copy_from_slice(&(ip_id as u16).to_be_bytes());
        buf[6..8].copy_from_slice(&0u16.to_be_bytes()); // no fragmentation
        buf[8] = 255; // TTL
        buf[9] = IPPROTO_UDP;
        // bytes 10..12 stay zero for the checksum pass
        buf[12..16].copy_from_slice(&self.source.addr.octets());
        buf[16..20].copy_from_slice(&self.target.addr.octets());
        let ip_check = internet_checksum(&buf[..IPV4_HEADER_LEN]);
        buf[10..12].copy_from_slice(&ip_check.to_be_bytes());

        // UDP header, RFC 768, checksum still zero.
        let udp = &mut buf[IPV4_HEADER_LEN..];
        udp[0..2].copy_from_slice(&self.source.port.to_be_bytes());
        udp[2..4].copy_from_slice(&self.target.port.to_be_bytes());
        udp[4..6].copy_from_slice(&(udp_len as u16).to_be_bytes());
        udp[6..8].copy_from_slice(&0u16.to_be_bytes());
        udp[UDP_HEADER_LEN..].copy_from_slice(payload);

        // UDP checksum over pseudo-header + UDP header + payload.
        let pseudo = &mut self.pseudogram[..PSEUDO_HEADER_LEN];
        pseudo[0..4].copy_from_slice(&self.source.addr.octets());
        pseudo[4..8].copy_from_slice(&self.target.addr.octets());
        pseudo[8] = 0;
        pseudo[9] = IPPROTO_UDP;
        pseudo[10..12].copy_from_slice(&(udp_len as u16).to_be_bytes());
        let udp_check =
            udp_checksum(&[&self.pseudogram[..PSEUDO_HEADER_LEN], &self.buf[IPV4_HEADER_LEN..total_len]]);
        self.buf[IPV4_HEADER_LEN + 6..IPV4_HEADER_LEN + 8]
            .copy_from_slice(&udp_check.to_be_bytes());

        Ok(&self.buf[..total_len])
    }
}
