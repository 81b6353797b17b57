//! Byte-stream frame assembly for the reader protocol.
//!
//! Frame format:
//! - LENGTH (1 byte): number of bytes that follow, CRC included
//! - ADDRESS (1 byte): reader address
//! - COMMAND (1 byte): command or response-command code
//! - STATUS (1 byte, responses only)
//! - PAYLOAD (0-250 bytes): command-specific data
//! - CRC-16 (2 bytes): LSB first, see [`crate::crc`]
//!
//! The total frame size is `LENGTH + 1`. The assembler only guarantees that
//! a complete frame has the declared size; the checksum has to be verified
//! separately before any field is trusted.

use heapless::Vec;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = 256;

/// Smallest response frame (LENGTH + ADDRESS + RECMD + STATUS + CRC)
pub const MIN_RESPONSE_SIZE: usize = 6;

/// Smallest command frame (LENGTH + ADDRESS + CMD + CRC)
pub const MIN_COMMAND_SIZE: usize = 5;

/// A partial frame is dropped when the line stays silent this long
pub const INTER_BYTE_TIMEOUT_MS: u64 = 100;

/// Errors raised while assembling frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Length byte declares a frame outside the accepted size range
    LengthOutOfRange(u8),
    /// More bytes arrived than the frame buffer can hold
    Overflow,
    /// Partial frame discarded after the inter-byte timeout
    Stale,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::LengthOutOfRange(len) => write!(f, "length byte {len:#04x} out of range"),
            FrameError::Overflow => f.write_str("frame buffer overflow"),
            FrameError::Stale => f.write_str("partial frame timed out"),
        }
    }
}

/// Assembler progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerPhase {
    /// Waiting for the length byte
    AwaitingLength,
    /// Collecting the rest of the frame
    Receiving,
    /// A full frame is buffered and must be taken before more bytes are accepted
    Complete,
}

/// State machine that cuts a raw byte stream into frames
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    phase: AssemblerPhase,
    buffer: Vec<u8, MAX_FRAME_SIZE>,
    expected: usize,
    min_frame_size: usize,
    last_byte_ms: u64,
    errors: u32,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an assembler for reader responses
    pub const fn new() -> Self {
        Self::with_min_frame_size(MIN_RESPONSE_SIZE)
    }

    /// Create an assembler accepting frames down to `min_frame_size` bytes
    ///
    /// Use [`MIN_COMMAND_SIZE`] to assemble outbound command captures.
    pub const fn with_min_frame_size(min_frame_size: usize) -> Self {
        Self {
            phase: AssemblerPhase::AwaitingLength,
            buffer: Vec::new(),
            expected: 0,
            min_frame_size,
            last_byte_ms: 0,
            errors: 0,
        }
    }

    /// Discard any progress and wait for a new length byte
    pub fn reset(&mut self) {
        self.phase = AssemblerPhase::AwaitingLength;
        self.buffer.clear();
        self.expected = 0;
    }

    /// Current phase
    pub fn phase(&self) -> AssemblerPhase {
        self.phase
    }

    /// True once a full frame is buffered
    pub fn is_complete(&self) -> bool {
        self.phase == AssemblerPhase::Complete
    }

    /// The assembled frame, if complete
    pub fn frame(&self) -> Option<&[u8]> {
        self.is_complete().then_some(self.buffer.as_slice())
    }

    /// Bytes buffered so far
    pub fn bytes_received(&self) -> usize {
        self.buffer.len()
    }

    /// Size of the frame being assembled (0 while awaiting the length byte)
    pub fn bytes_expected(&self) -> usize {
        self.expected
    }

    /// Number of rejected lengths, overflows and stale partial frames
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    /// Feed one byte received at `now_ms`
    ///
    /// Returns `Ok(true)` when the byte completed a frame and `Ok(false)`
    /// when more bytes are needed. A complete assembler refuses the byte
    /// with `Ok(true)` without consuming it; callers must take the frame
    /// and [`reset`](Self::reset) first.
    ///
    /// A stale partial frame is dropped silently before the byte is handled
    /// as the start of a new frame; only the drop is counted.
    pub fn push(&mut self, byte: u8, now_ms: u64) -> Result<bool, FrameError> {
        if self.phase == AssemblerPhase::Complete {
            return Ok(true);
        }

        if self.phase == AssemblerPhase::Receiving
            && now_ms.saturating_sub(self.last_byte_ms) > INTER_BYTE_TIMEOUT_MS
        {
            self.errors = self.errors.wrapping_add(1);
            self.reset();
        }
        self.last_byte_ms = now_ms;

        match self.phase {
            AssemblerPhase::AwaitingLength => {
                let expected = byte as usize + 1;
                if expected < self.min_frame_size || expected > MAX_FRAME_SIZE {
                    self.errors = self.errors.wrapping_add(1);
                    return Err(FrameError::LengthOutOfRange(byte));
                }
                self.buffer.clear();
                // Cannot fail: the buffer was just cleared
                let _ = self.buffer.push(byte);
                self.expected = expected;
                self.phase = AssemblerPhase::Receiving;
                Ok(false)
            }
            AssemblerPhase::Receiving => {
                if self.buffer.push(byte).is_err() {
                    self.errors = self.errors.wrapping_add(1);
                    self.reset();
                    return Err(FrameError::Overflow);
                }
                if self.buffer.len() == self.expected {
                    self.phase = AssemblerPhase::Complete;
                    return Ok(true);
                }
                Ok(false)
            }
            AssemblerPhase::Complete => Ok(true),
        }
    }

    /// Feed a chunk of bytes received at `now_ms`
    ///
    /// Returns the number of bytes consumed. Consumption stops at the byte
    /// that completes a frame; the remainder of `bytes` must be fed again
    /// after the frame has been taken. Rejected bytes count as consumed.
    pub fn feed(&mut self, bytes: &[u8], now_ms: u64) -> usize {
        let mut consumed = 0;
        for &byte in bytes {
            if self.is_complete() {
                break;
            }
            consumed += 1;
            if let Ok(true) = self.push(byte, now_ms) {
                break;
            }
        }
        consumed
    }
}
