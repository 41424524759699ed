//! Fixed-size record encoding
//!
//! Bank files are a bare sequence of equally sized records with no header
//! or checksum, so the record width alone is what lets a bank be validated
//! and indexed. Encoding is little-endian.

/// Largest record width supported
pub const MAX_RECORD_SIZE: usize = 8;

/// A plain, fixed-width value that can be logged to a bank file
///
/// Equality is required so unchanged values need not be rewritten.
pub trait Record: Copy + PartialEq {
    /// Encoded width in bytes (at most [`MAX_RECORD_SIZE`])
    const SIZE: usize;

    /// Encode into `out`, which is exactly `SIZE` bytes long
    fn encode(&self, out: &mut [u8]);

    /// Decode from `bytes`, which is exactly `SIZE` bytes long
    fn decode(bytes: &[u8]) -> Self;
}

impl Record for f64 {
    const SIZE: usize = 8;

    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        f64::from_le_bytes(raw)
    }
}

impl Record for i32 {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        i32::from_le_bytes(raw)
    }
}

impl Record for u16 {
    const SIZE: usize = 2;

    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl Record for bool {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    // Any non-zero byte reads as true
    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
