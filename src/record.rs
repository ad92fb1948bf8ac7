//! Fixed-width record layout and codec.
//!
//! A record is 4 bytes: a 2-byte signed key followed by a 2-byte signed
//! value, both big-endian. Records carry no identity beyond their current
//! file offset; sorting only permutes them.

/// Number of bytes in a single record (key + value).
pub const RECORD_SIZE: usize = 4;

/// Number of bytes in a single cached block.
pub const BLOCK_SIZE: usize = 4096;

/// Number of records held by one full block.
pub const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / RECORD_SIZE;

/// Extracts the key (first 2 bytes) from a record.
/// Callers guarantee the slice holds at least [`RECORD_SIZE`] bytes.
pub fn key(record: &[u8]) -> i16 {
    i16::from_be_bytes([record[0], record[1]])
}

/// Extracts the value (last 2 bytes) from a record.
pub fn value(record: &[u8]) -> i16 {
    i16::from_be_bytes([record[2], record[3]])
}

/// Builds a record from a key and a value.
pub fn encode(key: i16, value: i16) -> [u8; RECORD_SIZE] {
    let k = key.to_be_bytes();
    let v = value.to_be_bytes();
    [k[0], k[1], v[0], v[1]]
}
