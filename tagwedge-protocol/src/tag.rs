//! Tag records and EPC formatting

use core::fmt::Write;

use heapless::{String, Vec};

/// Longest EPC a tag block can carry
pub const MAX_EPC_LEN: usize = 62;

/// Longest TID kept alongside an EPC
pub const MAX_TID_LEN: usize = 32;

/// Capacity of a formatted EPC: two hex digits per byte plus separators
pub const EPC_STRING_CAPACITY: usize = 192;

/// Hex rendering of an EPC
pub type EpcString = String<EPC_STRING_CAPACITY>;

/// One tag observation decoded from a response
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TagRecord {
    pub epc: Vec<u8, MAX_EPC_LEN>,
    pub tid: Option<Vec<u8, MAX_TID_LEN>>,
    pub rssi: u8,
    pub antenna: u8,
    pub phase: Option<u32>,
    pub frequency_khz: Option<u32>,
}

impl TagRecord {
    /// Build a record without TID or phase data
    ///
    /// Returns `None` when `epc` exceeds [`MAX_EPC_LEN`].
    pub fn new(epc: &[u8], rssi: u8, antenna: u8) -> Option<Self> {
        Some(Self {
            epc: Vec::from_slice(epc).ok()?,
            tid: None,
            rssi,
            antenna,
            phase: None,
            frequency_khz: None,
        })
    }

    /// EPC rendered as uppercase hex, a space every `group_bytes` bytes
    pub fn epc_string(&self, group_bytes: usize) -> EpcString {
        format_epc(&self.epc, group_bytes)
    }
}

/// Render `epc` as uppercase hex
///
/// A space is inserted every `group_bytes` bytes; `0` disables grouping.
/// Input longer than [`MAX_EPC_LEN`] is truncated.
pub fn format_epc(epc: &[u8], group_bytes: usize) -> EpcString {
    let mut out = EpcString::new();
    for (i, byte) in epc.iter().take(MAX_EPC_LEN).enumerate() {
        if group_bytes > 0 && i > 0 && i % group_bytes == 0 {
            let _ = out.push(' ');
        }
        // Capacity covers MAX_EPC_LEN bytes at any grouping
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grouped() {
        let epc = [0xE2, 0x00, 0x00, 0x17, 0x22, 0x0A, 0x01, 0x23];
        assert_eq!(format_epc(&epc, 4).as_str(), "E2000017 220A0123");
    }

    #[test]
    fn test_format_ungrouped() {
        assert_eq!(format_epc(&[0xab, 0x01, 0xff], 0).as_str(), "AB01FF");
    }

    #[test]
    fn test_format_empty() {
        assert!(format_epc(&[], 4).is_empty());
    }

    #[test]
    fn test_format_longest_epc_fits() {
        let epc = [0x5A; MAX_EPC_LEN];
        let out = format_epc(&epc, 1);
        assert_eq!(out.len(), MAX_EPC_LEN * 2 + MAX_EPC_LEN - 1);
    }

    #[test]
    fn test_record_rejects_oversized_epc() {
        assert!(TagRecord::new(&[0u8; MAX_EPC_LEN + 1], 0, 0).is_none());
        let record = TagRecord::new(&[0x30, 0x08], 0x55, 0x01).unwrap();
        assert_eq!(record.epc_string(4).as_str(), "3008");
    }
}
