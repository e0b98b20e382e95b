//! PWM output abstractions
//!
//! Pins are addressed by GPIO number so the set of driven pins can come
//! from runtime configuration instead of being fixed at compile time.

/// Errors from PWM pin setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError {
    /// GPIO number does not exist on this chip
    InvalidPin,
    /// Pin is reserved for another function (UART, status LED, ...)
    Reserved,
    /// The PWM slice output behind this pin is already driven by another pin
    ChannelInUse,
}

/// Runtime-configurable PWM output bank
///
/// Implementations route a GPIO to its PWM hardware, set the counter wrap
/// and write compare levels. Once [`PwmDriver::attach`] succeeded for a pin,
/// level writes to that pin cannot fail.
pub trait PwmDriver {
    /// Route `pin` to PWM and configure its counter to wrap at `top`
    fn attach(&mut self, pin: u8, top: u16) -> Result<(), PwmError>;

    /// Return `pin` to its unconnected state
    fn detach(&mut self, pin: u8);

    /// Reset the whole PWM block, dropping every slice configuration
    fn reset(&mut self);

    /// Set the compare level of an attached pin
    ///
    /// `level` is in `0..=top`; the output is high for `level` counts
    /// out of `top + 1`.
    fn set_level(&mut self, pin: u8, level: u16);
}
