//! E310 Reader Wire Protocol
//!
//! This crate defines the UART protocol spoken by E310-class UHF RFID reader
//! modules. It covers checksum computation, byte-stream frame assembly,
//! outbound command encoding and inbound response decoding.
//!
//! # Protocol Overview
//!
//! Commands and responses share one frame layout:
//! ```text
//! ┌────────┬─────────┬─────────┬──────────┬───────────┬────────────┐
//! │ LENGTH │ ADDRESS │ COMMAND │ (STATUS) │ PAYLOAD   │ CRC-16     │
//! │ 1B     │ 1B      │ 1B      │ 1B       │ 0–250B    │ 2B, LSB 1st│
//! └────────┴─────────┴─────────┴──────────┴───────────┴────────────┘
//! ```
//!
//! `LENGTH` counts every byte after itself, so a frame is `LENGTH + 1`
//! bytes long. The `STATUS` byte is only present in responses.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod crc;
pub mod frame;
pub mod response;
pub mod status;
pub mod tag;

pub use command::{
    command_name, BaudRate, Command, EncodeError, Epc, FrequencyBand, InventoryMask,
    InventoryParams, MemoryBank, Password, SelectParams, SelectTarget, TagSelector, Target,
    TidWindow,
};
pub use crc::{crc16, verify};
pub use frame::{
    AssemblerPhase, FrameAssembler, FrameError, INTER_BYTE_TIMEOUT_MS, MAX_FRAME_SIZE,
    MIN_COMMAND_SIZE, MIN_RESPONSE_SIZE,
};
pub use response::{
    parse_header, DecodeError, InventoryBatch, InventoryStatistics, MemoryWords, ReaderInfo, Reply,
    Response, ResponseHeader, MAX_RESPONSE_PAYLOAD,
};
pub use status::Status;
pub use tag::{format_epc, EpcString, TagRecord};

/// Broadcast reader address, answered by any module on the bus
pub const ADDR_BROADCAST: u8 = 0xFF;

/// Factory default reader address
pub const ADDR_DEFAULT: u8 = 0x00;
