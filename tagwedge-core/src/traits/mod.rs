//! Collaborator traits
//!
//! These traits define the interface between the router and the
//! board-specific parts of the firmware: the UART driver, the keyboard
//! output, buzzer/LED feedback, persistent settings and the run button.

pub mod io;
pub mod sink;

pub use io::{Clock, InputControl, SettingsStore, Transport};
pub use sink::{NotificationSink, SinkError, TagSink};
