//! Transport, time and settings traits

/// Byte transport toward the reader (UART TX side)
///
/// Called from the interrupt half only.
pub trait Transport {
    /// Hand `bytes` to the hardware
    ///
    /// Returns how many bytes were accepted; `0` means the hardware cannot
    /// take more right now.
    fn send(&mut self, bytes: &[u8]) -> usize;
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Read-only view of the persisted reader settings
pub trait SettingsStore {
    /// RF output power in dBm (0-30)
    fn get_rf_power(&self) -> u8;

    /// Address of the reader on the bus
    fn get_reader_address(&self) -> u8;

    /// Antenna multiplexer configuration, `0` leaves the reader default
    fn get_antenna_config(&self) -> u8;
}

/// External run-state input (button, CLI)
///
/// Kept in sync with the controller so that a toggle input always starts
/// from the real state.
pub trait InputControl {
    fn set_inventory_running(&mut self, running: bool);
}

impl InputControl for () {
    fn set_inventory_running(&mut self, _running: bool) {}
}
