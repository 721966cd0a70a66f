//! Internet checksum (RFC 1071).
//!
//! The one's complement of the one's complement sum of 16-bit words.
//! Used twice per relayed datagram: over the IPv4 header alone, and over the
//! UDP pseudo-header + header + payload. The values land on the wire and are
//! verified by a real IP stack at the collector, so the computation must be
//! bit-exact.

/// Sum `data` as big-endian 16-bit words into a running one's complement
/// accumulator. An odd trailing byte is zero-padded into its own word.
fn sum_words(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    sum
}

/// Fold the carries back into the low 16 bits until none remain.
fn fold(mut sum: u32) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Compute the RFC 1071 Internet checksum over `data`.
///
/// Pure and deterministic. Recomputing the checksum over data with its own
/// checksum word appended yields zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(sum_words(0, data))
}

/// Compute the UDP checksum over the concatenation of `parts`.
///
/// Every part except the last must have even length so word alignment is
/// preserved across the boundaries (the 12-byte pseudo-header and the 8-byte
/// UDP header both satisfy this). A computed value of zero is transmitted as
/// `0xFFFF` per RFC 768, since zero on the wire means "no checksum".
pub fn udp_checksum(parts: &[&[u8]]) -> u16 {
    debug_assert!(
        parts.iter().rev().skip(1).all(|part| part.len() % 2 == 0),
        "only the final part may have odd length"
    );
    let sum = parts.iter().fold(0u32, |acc, part| sum_words(acc, part));
    let check = !fold(sum);
    if check == 0 { 0xffff } else { check }
}
