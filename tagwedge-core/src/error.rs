//! Link-level errors

use tagwedge_protocol::command::command_name;
use tagwedge_protocol::{EncodeError, Status};

/// Errors returned by the router and the inventory controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Router has not been started
    NotRunning,
    /// `start()` called twice
    AlreadyRunning,
    /// Command could not be encoded
    Encode(EncodeError),
    /// Outbound ring buffer cannot take the whole frame; nothing was queued
    TxOverflow { queued: usize, dropped: usize },
    /// No response to `command` before the deadline
    Timeout { command: u8 },
    /// Operation needs a completed handshake
    NotConnected,
    /// No handshake step got an answer
    HandshakeFailed,
    /// Reader answered `command` with an error status
    Rejected { command: u8, status: Status },
}

impl From<EncodeError> for LinkError {
    fn from(e: EncodeError) -> Self {
        LinkError::Encode(e)
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::NotRunning => f.write_str("router not running"),
            LinkError::AlreadyRunning => f.write_str("router already running"),
            LinkError::Encode(e) => write!(f, "encode failed: {e}"),
            LinkError::TxOverflow { queued, dropped } => {
                write!(f, "tx buffer full: {queued} queued, {dropped} dropped")
            }
            LinkError::Timeout { command } => {
                write!(f, "no response to {}", command_name(*command))
            }
            LinkError::NotConnected => f.write_str("reader not connected"),
            LinkError::HandshakeFailed => f.write_str("reader did not answer the handshake"),
            LinkError::Rejected { command, status } => {
                write!(f, "{} rejected: {status}", command_name(*command))
            }
        }
    }
}
