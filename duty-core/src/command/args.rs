//! Positional argument extraction

use duty_protocol::Command;

use crate::config::{ConfigError, MAX_VALUE};

/// Why a request's arguments were rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArgError {
    /// A required position is missing (`bad-args-count`)
    Missing,
    /// An argument is outside its domain (`bad-args`)
    Invalid,
}

impl From<ConfigError> for ArgError {
    fn from(_: ConfigError) -> Self {
        ArgError::Invalid
    }
}

/// Check that at least `count` arguments follow the verb
pub fn require(command: &Command, count: usize) -> Result<(), ArgError> {
    if command.arg_count() < count {
        return Err(ArgError::Missing);
    }
    Ok(())
}

/// Argument at `index`, which must be present
pub fn text(command: &Command, index: usize) -> Result<&str, ArgError> {
    command.arg(index).ok_or(ArgError::Missing)
}

/// Strictly parse an integer; surrounding whitespace is allowed
pub fn integer(raw: &str) -> Result<i64, ArgError> {
    raw.trim().parse::<i64>().map_err(|_| ArgError::Invalid)
}

/// Output index below `len`
pub fn index(raw: &str, len: usize) -> Result<usize, ArgError> {
    let value = integer(raw)?;
    usize::try_from(value)
        .ok()
        .filter(|&i| i < len)
        .ok_or(ArgError::Invalid)
}

/// Percent value in `0..=MAX_VALUE`
pub fn percent(raw: &str) -> Result<u8, ArgError> {
    u8::try_from(integer(raw)?)
        .ok()
        .filter(|&v| v <= MAX_VALUE)
        .ok_or(ArgError::Invalid)
}

/// GPIO number
pub fn port(raw: &str) -> Result<u8, ArgError> {
    u8::try_from(integer(raw)?).map_err(|_| ArgError::Invalid)
}

/// Milliseconds as `u32`
pub fn millis(raw: &str) -> Result<u32, ArgError> {
    u32::try_from(integer(raw)?).map_err(|_| ArgError::Invalid)
}
