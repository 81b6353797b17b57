//! Link configuration type definitions

use tagwedge_protocol::command::{SCAN_TIME_CONTINUOUS, SCAN_TIME_SINGLE};
use tagwedge_protocol::{Command, Target};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default debounce window between two emissions of the same tag
pub const DEFAULT_DEBOUNCE_MS: u32 = 1000;

/// Default wait for a command response
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 200;

/// Default polling interval of the wait helpers
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 5;

/// Default pause between two polled inventory rounds
pub const DEFAULT_ROUND_INTERVAL_MS: u32 = 100;

/// Default grace period after the scan time before a round is abandoned
pub const DEFAULT_ROUND_TIMEOUT_MS: u32 = 500;

/// Bytes per space-separated EPC group
pub const DEFAULT_EPC_GROUP_BYTES: u8 = 4;

/// How inventory is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InventoryStrategy {
    /// Reader runs fast inventory and pushes tags on its own
    Fast,
    /// One tag-inventory command per round, re-issued after `interval_ms`
    Repeating { interval_ms: u32 },
    /// One round, then back to idle
    SingleShot,
}

impl Default for InventoryStrategy {
    fn default() -> Self {
        InventoryStrategy::Repeating {
            interval_ms: DEFAULT_ROUND_INTERVAL_MS,
        }
    }
}

impl InventoryStrategy {
    /// True when the router sends one command per round
    pub fn is_polled(self) -> bool {
        !matches!(self, InventoryStrategy::Fast)
    }

    /// Scan time of one round (× 100 ms)
    pub fn scan_time(self) -> u8 {
        match self {
            InventoryStrategy::SingleShot => SCAN_TIME_SINGLE,
            _ => SCAN_TIME_CONTINUOUS,
        }
    }

    /// Command that starts inventory (or one round of it)
    pub fn start_command(self) -> Command {
        match self {
            InventoryStrategy::Fast => Command::StartFastInventory(Target::A),
            _ => Command::TagInventory {
                scan_time: self.scan_time(),
            },
        }
    }

    /// Command that stops inventory
    pub fn stop_command(self) -> Command {
        match self {
            InventoryStrategy::Fast => Command::StopFastInventory,
            _ => Command::StopImmediately,
        }
    }
}

/// Router and controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Minimum time between two emissions of the same EPC
    pub debounce_ms: u32,
    /// Wait for each handshake or command response
    pub response_timeout_ms: u32,
    /// Delay between two polls while waiting
    pub poll_interval_ms: u32,
    /// Work mode byte sent during the handshake
    pub work_mode: u8,
    pub strategy: InventoryStrategy,
    /// EPC hex grouping, 0 = no separators
    pub epc_group_bytes: u8,
    /// Extra wait beyond the scan time before a polled round is abandoned
    pub round_timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            work_mode: 0x00,
            strategy: InventoryStrategy::default(),
            epc_group_bytes: DEFAULT_EPC_GROUP_BYTES,
            round_timeout_ms: DEFAULT_ROUND_TIMEOUT_MS,
        }
    }
}

impl LinkConfig {
    /// Time after which an unanswered polled round is given up
    pub fn round_deadline_ms(&self) -> u64 {
        self.strategy.scan_time() as u64 * 100 + self.round_timeout_ms as u64
    }

    /// Serialize into `buf`, returning the used part
    #[cfg(feature = "serde")]
    pub fn to_bytes<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], postcard::Error> {
        postcard::to_slice(self, buf)
    }

    /// Deserialize from a blob written by [`to_bytes`](Self::to_bytes)
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
