//! Response line encoding
//!
//! Two shapes exist on the wire:
//! - `{"code":"ok","message":"pong"}` for short status messages
//! - `{"code":"ok","data":{...}}` for structured payloads
//!
//! Both are written as one line terminated by `\n`.

use serde::Serialize;

use crate::line::LINE_END;

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum ResponseCode {
    /// Request succeeded
    Ok,
    /// Unsolicited status report (boot messages)
    Info,
    /// Request rejected
    Err,
}

/// Message strings used on the wire
pub mod messages {
    /// Generic success
    pub const OK: &str = "ok";
    /// Reply to `ping` and to unknown verbs
    pub const PONG: &str = "pong";
    /// Argument present but outside its domain
    pub const BAD_ARGS: &str = "bad-args";
    /// Required argument missing
    pub const BAD_ARGS_COUNT: &str = "bad-args-count";
    /// Request line is not a JSON array of strings
    pub const BAD_JSON: &str = "bad-json";

    /// Previous reset was triggered by the watchdog
    pub const AFTER_HW_RESET: &str = "after-hw-reset";
    /// Factory reset wiped the storage partition
    pub const CLEAR_OK: &str = "clear-ok";
    /// Storage could not be mounted and was formatted
    pub const STORAGE_FORMATTED: &str = "storage-formatted";
    /// Storage stays unusable after formatting
    pub const STORAGE_UNAVAILABLE: &str = "storage-unavailable";
    /// No usable stored configuration, running on defaults
    pub const LOADING_DEFAULT_CONFIG: &str = "loading-default-config";
}

/// Errors from response encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer cannot hold the encoded line
    BufferTooSmall,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    code: ResponseCode,
    message: &'a str,
}

#[derive(Serialize)]
struct DataBody<'a, T: Serialize> {
    code: ResponseCode,
    data: &'a T,
}

/// Encode a `{code, message}` line into `buffer`
///
/// Returns the number of bytes written, terminator included.
pub fn encode_message(
    code: ResponseCode,
    message: &str,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    encode_line(&MessageBody { code, message }, buffer)
}

/// Encode a `{code, data}` line into `buffer`
///
/// Returns the number of bytes written, terminator included.
pub fn encode_data<T: Serialize>(
    code: ResponseCode,
    data: &T,
    buffer: &mut [u8],
) -> Result<usize, EncodeError> {
    encode_line(&DataBody { code, data }, buffer)
}

fn encode_line<T: Serialize>(body: &T, buffer: &mut [u8]) -> Result<usize, EncodeError> {
    let len = serde_json_core::to_slice(body, buffer).map_err(|_| EncodeError::BufferTooSmall)?;
    let end = buffer.get_mut(len).ok_or(EncodeError::BufferTooSmall)?;
    *end = LINE_END;
    Ok(len + 1)
}
