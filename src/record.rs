//! Fixed-size telemetry record emitted by the beam position monitor.
//!
//! The device delivers one 64-byte block per `read()` call on its stream
//! device. All multi-byte fields are little-endian as produced by the
//! instrument's ARM CPU. Decoding validates the block size up front and reads
//! every field explicitly rather than aliasing the byte buffer through a
//! struct pointer.

use crate::{Result, StreamError};

/// On-wire size of one telemetry record in bytes.
///
/// Any `read()` returning a different byte count is a non-record and is
/// discarded by the reader loop. There is no partial-record buffering.
pub const RECORD_SIZE: usize = 64;

/// One single-pass telemetry record as emitted by the instrument.
///
/// The four channel amplitudes and the derived sum/position/shape numerators
/// are interpreted by the calibration layer; trigger/bunch counters, status,
/// mode, the reserved words and the timestamp are carried through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryRecord {
    /// Channel A raw amplitude (counts).
    pub va: i32,
    /// Channel B raw amplitude (counts).
    pub vb: i32,
    /// Channel C raw amplitude (counts).
    pub vc: i32,
    /// Channel D raw amplitude (counts).
    pub vd: i32,
    /// Amplitude sum, proportional to bunch charge.
    pub sum: i32,
    /// Shape parameter numerator.
    pub q: i32,
    /// Horizontal position numerator.
    pub x: i32,
    /// Vertical position numerator.
    pub y: i32,
    /// Trigger counter (carried, not interpreted).
    pub trigger_cnt: u32,
    /// Bunch counter (carried, not interpreted).
    pub bunch_cnt: u32,
    /// Device status flags (carried, not interpreted).
    pub status: u32,
    /// Device mode flags (carried, not interpreted).
    pub mode: u32,
    /// Reserved word.
    pub r2: i32,
    /// Reserved word.
    pub r3: i32,
    /// Device timestamp (carried, not interpreted).
    pub time: u64,
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(word)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

impl TelemetryRecord {
    /// Decode one record from exactly [`RECORD_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns a decode error when `bytes` is not exactly one record long.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(StreamError::decode_error(
                "telemetry record",
                format!("expected {} bytes, got {}", RECORD_SIZE, bytes.len()),
            ));
        }

        Ok(Self {
            va: read_i32(bytes, 0),
            vb: read_i32(bytes, 4),
            vc: read_i32(bytes, 8),
            vd: read_i32(bytes, 12),
            sum: read_i32(bytes, 16),
            q: read_i32(bytes, 20),
            x: read_i32(bytes, 24),
            y: read_i32(bytes, 28),
            trigger_cnt: read_u32(bytes, 32),
            bunch_cnt: read_u32(bytes, 36),
            status: read_u32(bytes, 40),
            mode: read_u32(bytes, 44),
            r2: read_i32(bytes, 48),
            r3: read_i32(bytes, 52),
            time: read_u64(bytes, 56),
        })
    }

    /// Encode this record into its on-wire form.
    ///
    /// The instrument is the only producer of records in production; this is
    /// the inverse of [`decode`](Self::decode) for building replay fixtures
    /// and test streams.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.va.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.vb.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.vc.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.vd.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.sum.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.q.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.x.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.y.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.trigger_cnt.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.bunch_cnt.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.status.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.mode.to_le_bytes());
        bytes[48..52].copy_from_slice(&self.r2.to_le_bytes());
        bytes[52..56].copy_from_slice(&self.r3.to_le_bytes());
        bytes[56..64].copy_from_slice(&self.time.to_le_bytes());
        bytes
    }
}
