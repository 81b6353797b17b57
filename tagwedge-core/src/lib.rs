//! Board-agnostic core of the RFID keyboard-wedge firmware
//!
//! This crate sits between the UART interrupt and the tag output:
//!
//! - Interrupt-side ring buffers and the byte pump ([`link`])
//! - Frame router with the `Idle`/`Inventory` mode machine ([`router`])
//! - Duplicate tag filter ([`filter`])
//! - Reader handshake and inventory start/stop ([`inventory`])
//! - Collaborator traits implemented by the board ([`traits`])
//! - Link configuration types ([`config`])
//!
//! Wiring a board takes three steps: create [`LinkQueues`] once, split it,
//! and hand the router half to [`Router::new`]. The serial half goes to the
//! UART interrupt.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod link;
pub mod router;
pub mod traits;

#[cfg(test)]
mod testing;

pub use config::{InventoryStrategy, LinkConfig};
pub use error::LinkError;
pub use filter::{DuplicateFilter, FilterSummary};
pub use inventory::InventoryController;
pub use link::{LinkQueues, LinkShared, RouterPort, SerialPort};
pub use router::{Ack, Mode, ProcessOutcome, ReaderLink, Router, RouterStats};
