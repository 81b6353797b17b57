//! Response status codes

pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_OPERATION_COMPLETE: u8 = 0x01;
pub const STATUS_INVENTORY_TIMEOUT: u8 = 0x02;
pub const STATUS_MORE_DATA: u8 = 0x03;
pub const STATUS_MEMORY_FULL: u8 = 0x04;
pub const STATUS_STATISTICS_PACKET: u8 = 0x26;
pub const STATUS_ANTENNA_ERROR: u8 = 0xF8;
pub const STATUS_NO_TAG_FOUND: u8 = 0xFB;
pub const STATUS_INVALID_LENGTH: u8 = 0xFD;
pub const STATUS_INVALID_COMMAND: u8 = 0xFE;
pub const STATUS_UNKNOWN_PARAMETER: u8 = 0xFF;

/// Status byte carried by every response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Success,
    OperationComplete,
    InventoryTimeout,
    /// More frames follow for the same command
    MoreData,
    MemoryFull,
    /// Inventory statistics packet instead of tag data
    StatisticsPacket,
    AntennaError,
    NoTagFound,
    InvalidLength,
    /// Command unknown or its CRC was wrong
    InvalidCommand,
    UnknownParameter,
    Other(u8),
}

impl Status {
    /// Parse a status from its wire byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STATUS_SUCCESS => Status::Success,
            STATUS_OPERATION_COMPLETE => Status::OperationComplete,
            STATUS_INVENTORY_TIMEOUT => Status::InventoryTimeout,
            STATUS_MORE_DATA => Status::MoreData,
            STATUS_MEMORY_FULL => Status::MemoryFull,
            STATUS_STATISTICS_PACKET => Status::StatisticsPacket,
            STATUS_ANTENNA_ERROR => Status::AntennaError,
            STATUS_NO_TAG_FOUND => Status::NoTagFound,
            STATUS_INVALID_LENGTH => Status::InvalidLength,
            STATUS_INVALID_COMMAND => Status::InvalidCommand,
            STATUS_UNKNOWN_PARAMETER => Status::UnknownParameter,
            other => Status::Other(other),
        }
    }

    /// Convert to wire byte
    pub fn as_byte(self) -> u8 {
        match self {
            Status::Success => STATUS_SUCCESS,
            Status::OperationComplete => STATUS_OPERATION_COMPLETE,
            Status::InventoryTimeout => STATUS_INVENTORY_TIMEOUT,
            Status::MoreData => STATUS_MORE_DATA,
            Status::MemoryFull => STATUS_MEMORY_FULL,
            Status::StatisticsPacket => STATUS_STATISTICS_PACKET,
            Status::AntennaError => STATUS_ANTENNA_ERROR,
            Status::NoTagFound => STATUS_NO_TAG_FOUND,
            Status::InvalidLength => STATUS_INVALID_LENGTH,
            Status::InvalidCommand => STATUS_INVALID_COMMAND,
            Status::UnknownParameter => STATUS_UNKNOWN_PARAMETER,
            Status::Other(byte) => byte,
        }
    }

    /// Returns true if the reader accepted the command
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Success | Status::OperationComplete)
    }

    /// Returns true if an inventory round ends with this status
    ///
    /// `MoreData` and statistics packets are followed by further frames of
    /// the same round; every other status closes it.
    pub fn is_round_terminal(self) -> bool {
        !matches!(self, Status::MoreData | Status::StatisticsPacket)
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::OperationComplete => "operation complete",
            Status::InventoryTimeout => "inventory timeout",
            Status::MoreData => "more data",
            Status::MemoryFull => "memory full",
            Status::StatisticsPacket => "statistics packet",
            Status::AntennaError => "antenna error",
            Status::NoTagFound => "no tag found",
            Status::InvalidLength => "invalid length",
            Status::InvalidCommand => "invalid command or CRC",
            Status::UnknownParameter => "unknown parameter",
            Status::Other(_) => "unknown status",
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({:#04x})", self.description(), self.as_byte())
    }
}
