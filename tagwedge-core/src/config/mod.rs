//! Configuration types
//!
//! Board-agnostic link configuration, stored by the external settings
//! store as postcard binary data.

pub mod types;

pub use types::*;
