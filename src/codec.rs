//! Packing of the 4-byte fields shared by descriptors and directory entries.
//!
//! Fields are little-endian. An empty field (a free descriptor's size, an
//! unallocated block pointer) is stored as all ones.

const EMPTY: [u8; 4] = [0xFF; 4];

pub fn encode(value: Option<u32>) -> [u8; 4] {
    match value {
        Some(v) => v.to_le_bytes(),
        None => EMPTY,
    }
}

pub fn decode(bytes: [u8; 4]) -> Option<u32> {
    match u32::from_le_bytes(bytes) {
        u32::MAX => None,
        v => Some(v),
    }
}

/// Decodes the field starting at `offset`.
pub fn read_field(buf: &[u8], offset: usize) -> Option<u32> {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    decode(raw)
}

pub fn write_field(buf: &mut [u8], offset: usize, value: Option<u32>) {
    buf[offset..offset + 4].copy_from_slice(&encode(value));
}
