//! Inbound response decoding
//!
//! A response is decoded in two steps. [`parse_header`] checks the frame
//! geometry and extracts the fixed fields, then [`Reply::decode`] interprets
//! the payload according to the response-command code. [`Response::parse`]
//! runs both after verifying the checksum and is what callers normally use.
//!
//! Every decoder works on borrowed slices and reports short or inconsistent
//! payloads as [`DecodeError`] instead of reading past the end.

use heapless::Vec;

use crate::command::{
    FrequencyBand, CMD_GET_TAG_COUNT, CMD_MEASURE_TEMPERATURE, CMD_OBTAIN_GPIO_STATE,
    CMD_OBTAIN_READER_INFO, CMD_READ_DATA, CMD_SINGLE_TAG_INVENTORY, CMD_TAG_INVENTORY,
    RECMD_AUTO_UPLOAD,
};
use crate::crc::{verify, CRC_LEN};
use crate::frame::{MAX_FRAME_SIZE, MIN_RESPONSE_SIZE};
use crate::status::Status;
use crate::tag::{TagRecord, MAX_EPC_LEN, MAX_TID_LEN};

/// LENGTH, ADDRESS, RECMD and STATUS
pub const HEADER_LEN: usize = 4;

/// Largest response payload after the header
pub const MAX_RESPONSE_PAYLOAD: usize = MAX_FRAME_SIZE - HEADER_LEN - CRC_LEN;

/// Minimum reader-info payload
pub const READER_INFO_LEN: usize = 12;

/// Inventory statistics payload size
pub const STATISTICS_LEN: usize = 7;

/// Flags byte of a tag block: EPC and TID share the payload
const BLOCK_EPC_TID: u8 = 0x80;
/// Flags byte of a tag block: phase and frequency follow the RSSI
const BLOCK_PHASE_FREQ: u8 = 0x40;
const BLOCK_LEN_MASK: u8 = 0x3F;

/// Errors raised while decoding responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame is shorter than the smallest response
    TooShort,
    /// Trailing checksum does not match
    CrcMismatch,
    /// Length byte disagrees with the frame size
    LengthMismatch { declared: usize, actual: usize },
    /// Payload ends before a field it announces
    Truncated,
    /// A length field is out of range
    InvalidLength(u8),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::TooShort => f.write_str("frame too short"),
            DecodeError::CrcMismatch => f.write_str("crc mismatch"),
            DecodeError::LengthMismatch { declared, actual } => {
                write!(f, "length byte says {declared} bytes, frame has {actual}")
            }
            DecodeError::Truncated => f.write_str("payload truncated"),
            DecodeError::InvalidLength(len) => write!(f, "invalid length field {len}"),
        }
    }
}

/// Fixed fields at the start of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseHeader {
    pub length: u8,
    pub address: u8,
    pub command: u8,
    pub status: Status,
}

/// Extract the header of a complete, checksum-verified frame
///
/// Only the geometry is checked here; call [`verify`] first, or use
/// [`Response::parse`].
pub fn parse_header(frame: &[u8]) -> Result<ResponseHeader, DecodeError> {
    if frame.len() < MIN_RESPONSE_SIZE {
        return Err(DecodeError::TooShort);
    }
    let declared = frame[0] as usize + 1;
    if declared != frame.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }
    Ok(ResponseHeader {
        length: frame[0],
        address: frame[1],
        command: frame[2],
        status: Status::from_byte(frame[3]),
    })
}

/// Payload bytes between the header and the checksum
pub fn payload(frame: &[u8]) -> &[u8] {
    if frame.len() < HEADER_LEN + CRC_LEN {
        return &[];
    }
    &frame[HEADER_LEN..frame.len() - CRC_LEN]
}

/// A verified response frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response<'a> {
    pub header: ResponseHeader,
    pub reply: Reply<'a>,
}

impl<'a> Response<'a> {
    /// Verify the checksum, then decode header and payload
    pub fn parse(frame: &'a [u8]) -> Result<Self, DecodeError> {
        if frame.len() < MIN_RESPONSE_SIZE {
            return Err(DecodeError::TooShort);
        }
        if !verify(frame) {
            return Err(DecodeError::CrcMismatch);
        }
        let header = parse_header(frame)?;
        let reply = Reply::decode(&header, payload(frame))?;
        Ok(Self { header, reply })
    }
}

/// Decoded response payload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply<'a> {
    /// Tag pushed by fast inventory
    AutoUpload(TagRecord),
    /// Tags reported by one inventory round
    Inventory(InventoryBatch<'a>),
    /// Per-antenna read statistics
    Statistics(InventoryStatistics),
    ReaderInfo(ReaderInfo),
    TagCount(u16),
    /// Reader temperature in °C
    Temperature(i16),
    /// Words returned by a memory read
    ReadData(MemoryWords<'a>),
    /// Input and output pin levels, one bit per pin
    GpioState(u8),
    /// Any other response, payload left raw
    Other {
        command: u8,
        status: Status,
        payload: &'a [u8],
    },
}

impl<'a> Reply<'a> {
    /// Interpret `payload` according to the header
    pub fn decode(header: &ResponseHeader, payload: &'a [u8]) -> Result<Self, DecodeError> {
        let other = Reply::Other {
            command: header.command,
            status: header.status,
            payload,
        };

        let reply = match header.command {
            RECMD_AUTO_UPLOAD => Reply::AutoUpload(decode_auto_upload(payload)?),
            CMD_TAG_INVENTORY | CMD_SINGLE_TAG_INVENTORY => match header.status {
                Status::StatisticsPacket => {
                    Reply::Statistics(InventoryStatistics::decode(payload)?)
                }
                _ if payload.len() >= 2 => Reply::Inventory(InventoryBatch::decode(payload)?),
                _ => other,
            },
            CMD_OBTAIN_READER_INFO if header.status.is_ok() => {
                Reply::ReaderInfo(ReaderInfo::decode(payload)?)
            }
            CMD_GET_TAG_COUNT if header.status.is_ok() => match payload {
                [hi, lo, ..] => Reply::TagCount(u16::from_be_bytes([*hi, *lo])),
                _ => return Err(DecodeError::Truncated),
            },
            CMD_MEASURE_TEMPERATURE if header.status.is_ok() => match payload {
                [sign, magnitude, ..] => {
                    let magnitude = *magnitude as i16;
                    Reply::Temperature(if *sign == 0 { -magnitude } else { magnitude })
                }
                _ => return Err(DecodeError::Truncated),
            },
            CMD_READ_DATA if header.status.is_ok() => {
                Reply::ReadData(MemoryWords::decode(payload)?)
            }
            CMD_OBTAIN_GPIO_STATE if header.status.is_ok() => match payload {
                [pins, ..] => Reply::GpioState(*pins),
                _ => return Err(DecodeError::Truncated),
            },
            _ => other,
        };
        Ok(reply)
    }
}

/// Tag memory contents, MSB-first words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryWords<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryWords<'a> {
    /// An empty read is `Truncated`. A trailing odd byte is kept in
    /// [`bytes`](Self::bytes) and counts as a word.
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Truncated);
        }
        Ok(Self { bytes: payload })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn word_count(&self) -> usize {
        self.bytes.len().div_ceil(2)
    }

    /// Complete words in wire order
    pub fn words(&self) -> impl Iterator<Item = u16> + 'a {
        self.bytes
            .chunks_exact(2)
            .map(|w| u16::from_be_bytes([w[0], w[1]]))
    }
}

/// `antenna | epc_len | epc | rssi`
///
/// EPCs longer than [`MAX_EPC_LEN`] are truncated.
fn decode_auto_upload(payload: &[u8]) -> Result<TagRecord, DecodeError> {
    let [antenna, epc_len, rest @ ..] = payload else {
        return Err(DecodeError::Truncated);
    };
    if *epc_len == 0 {
        return Err(DecodeError::InvalidLength(*epc_len));
    }
    let epc_len = *epc_len as usize;
    if rest.len() < epc_len + 1 {
        return Err(DecodeError::Truncated);
    }
    let epc = &rest[..epc_len.min(MAX_EPC_LEN)];
    Ok(TagRecord {
        epc: to_vec(epc),
        tid: None,
        rssi: rest[epc_len],
        antenna: *antenna,
        phase: None,
        frequency_khz: None,
    })
}

/// `antenna | tag_count | tag_block*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InventoryBatch<'a> {
    pub antenna: u8,
    pub count: u8,
    blocks: &'a [u8],
}

impl<'a> InventoryBatch<'a> {
    /// Decode the batch header and check that every announced block is present
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        let [antenna, count, blocks @ ..] = payload else {
            return Err(DecodeError::Truncated);
        };
        let batch = Self {
            antenna: *antenna,
            count: *count,
            blocks,
        };
        for tag in batch.tags() {
            tag?;
        }
        Ok(batch)
    }

    /// Iterate the tag blocks
    pub fn tags(&self) -> TagBlocks<'a> {
        TagBlocks {
            antenna: self.antenna,
            remaining: self.count,
            data: self.blocks,
        }
    }
}

/// Iterator over the tag blocks of an [`InventoryBatch`]
///
/// Stops after the announced count, or after the first malformed block.
#[derive(Debug, Clone)]
pub struct TagBlocks<'a> {
    antenna: u8,
    remaining: u8,
    data: &'a [u8],
}

impl Iterator for TagBlocks<'_> {
    type Item = Result<TagRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match decode_tag_block(self.data, self.antenna) {
            Ok((tag, used)) => {
                self.remaining -= 1;
                self.data = &self.data[used..];
                Some(Ok(tag))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Decode one tag block, returning the record and the bytes consumed
fn decode_tag_block(data: &[u8], antenna: u8) -> Result<(TagRecord, usize), DecodeError> {
    let (&flags, rest) = data.split_first().ok_or(DecodeError::Truncated)?;
    let len = (flags & BLOCK_LEN_MASK) as usize;
    if len == 0 {
        return Err(DecodeError::InvalidLength(flags));
    }
    let body = rest.get(..len).ok_or(DecodeError::Truncated)?;

    let mut tag = TagRecord {
        epc: Vec::new(),
        tid: None,
        rssi: 0,
        antenna,
        phase: None,
        frequency_khz: None,
    };

    match body {
        [pc_hi, pc_lo, tail @ ..] if flags & BLOCK_EPC_TID != 0 => {
            let words = (u16::from_be_bytes([*pc_hi, *pc_lo]) >> 11) as usize;
            let epc_len = words * 2;
            // PC word, EPC, then the EPC CRC before any TID bytes
            if 2 + epc_len + 2 <= len {
                tag.epc = to_vec(&tail[..epc_len.min(MAX_EPC_LEN)]);
                let tid = &tail[epc_len + 2..];
                if !tid.is_empty() {
                    tag.tid = Some(to_vec(&tid[..tid.len().min(MAX_TID_LEN)]));
                }
            } else {
                tag.epc = to_vec(&body[..len.min(MAX_EPC_LEN)]);
            }
        }
        _ => tag.epc = to_vec(&body[..len.min(MAX_EPC_LEN)]),
    }

    let mut idx = 1 + len;
    tag.rssi = *data.get(idx).ok_or(DecodeError::Truncated)?;
    idx += 1;

    if flags & BLOCK_PHASE_FREQ != 0 {
        let extra = data.get(idx..idx + 7).ok_or(DecodeError::Truncated)?;
        tag.phase = Some(u32::from_le_bytes([extra[0], extra[1], extra[2], extra[3]]));
        tag.frequency_khz = Some(u32::from_le_bytes([extra[4], extra[5], extra[6], 0]));
        idx += 7;
    }

    Ok((tag, idx))
}

fn to_vec<const N: usize>(bytes: &[u8]) -> Vec<u8, N> {
    let mut vec = Vec::new();
    // Callers clamp to N beforehand
    let _ = vec.extend_from_slice(&bytes[..bytes.len().min(N)]);
    vec
}

/// `antenna | read_rate (LE) | total_count (LE)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InventoryStatistics {
    pub antenna: u8,
    /// Reads per second
    pub read_rate: u16,
    pub total_count: u32,
}

impl InventoryStatistics {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let p = payload.get(..STATISTICS_LEN).ok_or(DecodeError::Truncated)?;
        Ok(Self {
            antenna: p[0],
            read_rate: u16::from_le_bytes([p[1], p[2]]),
            total_count: u32::from_le_bytes([p[3], p[4], p[5], p[6]]),
        })
    }
}

/// Reader identification and current settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReaderInfo {
    /// Raw firmware version as sent (little-endian word)
    pub version: u16,
    pub model: u8,
    /// Supported protocol bitmask
    pub protocol: u8,
    pub max_frequency: u8,
    pub min_frequency: u8,
    /// RF power in dBm
    pub power: u8,
    /// Inventory time in 100 ms units
    pub scan_time: u8,
    pub antenna: u8,
    pub antenna_check: bool,
}

impl ReaderInfo {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let p = payload.get(..READER_INFO_LEN).ok_or(DecodeError::Truncated)?;
        Ok(Self {
            version: u16::from_le_bytes([p[0], p[1]]),
            model: p[2],
            protocol: p[3],
            max_frequency: p[4],
            min_frequency: p[5],
            power: p[6],
            scan_time: p[7],
            antenna: p[8],
            antenna_check: p[11] != 0,
        })
    }

    pub fn major(&self) -> u8 {
        (self.version >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        self.version as u8
    }

    /// Regulatory band from the two frequency bytes
    pub fn band(&self) -> Option<FrequencyBand> {
        FrequencyBand::from_frequency_bytes(self.max_frequency, self.min_frequency)
    }

    pub fn max_channel(&self) -> u8 {
        self.max_frequency & 0x3F
    }

    pub fn min_channel(&self) -> u8 {
        self.min_frequency & 0x3F
    }
}
