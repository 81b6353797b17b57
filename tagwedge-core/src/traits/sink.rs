//! Tag output and feedback traits

/// Errors reported by a tag sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// Output is not ready (host not enumerated, queue full)
    Busy,
    /// Output is gone
    Disconnected,
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SinkError::Busy => f.write_str("sink busy"),
            SinkError::Disconnected => f.write_str("sink disconnected"),
        }
    }
}

/// Destination of emitted tag reads
///
/// Receives the EPC formatted as uppercase hex. A keyboard-wedge
/// implementation types it followed by a line terminator.
pub trait TagSink {
    fn emit_tag(&mut self, epc: &str) -> Result<(), SinkError>;
}

/// Audible/visual feedback, fire-and-forget
pub trait NotificationSink {
    /// A tag was emitted
    fn on_tag_read(&mut self);

    /// Error indication on or off
    fn on_error(&mut self, active: bool);
}

impl NotificationSink for () {
    fn on_tag_read(&mut self) {}

    fn on_error(&mut self, _active: bool) {}
}
