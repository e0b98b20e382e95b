//! Duty Serial Command Protocol
//!
//! This crate defines the line-based protocol between a host and the
//! board. The protocol is designed for simplicity and easy scripting from
//! any language with a JSON library.
//!
//! # Protocol Overview
//!
//! Every request and every response is a single line of JSON terminated
//! by `\n`:
//! ```text
//! host  → board   ["set-value","0","75"]
//! board → host    {"code":"ok","message":"ok"}
//!
//! host  → board   ["get-value"]
//! board → host    {"code":"ok","data":{"values":[75]}}
//! ```
//!
//! Requests are arrays of strings: the verb followed by positional
//! arguments. Responses carry a `code` (`ok`, `info`, `err`) and either a
//! short `message` or a structured `data` object.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod line;
pub mod response;

pub use command::{Command, ParseError, Verb, MAX_ARG_LEN, MAX_PARTS};
pub use line::{Line, LineBuffer, LineError, MAX_LINE_LEN};
pub use response::{encode_data, encode_message, messages, EncodeError, ResponseCode};
