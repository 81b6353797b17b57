//! CRC-16 used by the reader wire protocol
//!
//! Reflected polynomial `0x8408`, initial value `0xFFFF`, no final XOR.
//! The checksum covers every byte of the frame before it and is transmitted
//! least-significant byte first.

/// Initial register value
const CRC_INIT: u16 = 0xFFFF;

/// Reflected generator polynomial
const CRC_POLY: u16 = 0x8408;

/// Number of checksum bytes at the end of a frame
pub const CRC_LEN: usize = 2;

/// Compute the checksum over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Check the trailing checksum of a complete frame
///
/// The frame must hold at least one data byte plus the two checksum bytes.
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < CRC_LEN + 1 {
        return false;
    }
    let split = frame.len() - CRC_LEN;
    let received = u16::from_le_bytes([frame[split], frame[split + 1]]);
    crc16(&frame[..split]) == received
}
