//! Binary codec
//!
//! Fixed-width big-endian integer encoding at a buffer offset. Every on-disk
//! field (data file headers, chunk slot headers, log length prefixes and
//! metadata entries) goes through these helpers.
//!
//! Decoding does not check the buffer length: callers make sure `width`
//! bytes remain past `offset`.

pub fn encode_u16(value: u16, buf: &mut [u8], offset: usize) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn encode_u32(value: u32, buf: &mut [u8], offset: usize) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

pub fn encode_u64(value: u64, buf: &mut [u8], offset: usize) {
    buf[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

pub fn encode_i64(value: i64, buf: &mut [u8], offset: usize) {
    buf[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}

pub fn decode_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

pub fn decode_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub fn decode_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

pub fn decode_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_be_bytes(bytes)
}
