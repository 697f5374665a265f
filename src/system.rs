//! System control primitives

/// Reboot primitive used by the power-off command
pub trait SystemControl {
    /// Reset the whole chip
    ///
    /// Does not return on hardware.
    fn cold_reset(&mut self);
}

/// Reset through the chip's software reset
#[cfg(feature = "embedded")]
pub struct EspSystem;

#[cfg(feature = "embedded")]
impl SystemControl for EspSystem {
    fn cold_reset(&mut self) {
        log::info!("Rebooting...");
        esp_hal::system::software_reset()
    }
}
