//! Handler responses

use duty_protocol::{encode_data, encode_message, messages, EncodeError, ResponseCode};
use serde::Serialize;

use crate::config::{ConfigDocument, ConfigSnapshot, ValueList};

use super::args::ArgError;

/// Static board capabilities reported by `board-info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardInfo {
    pub max_ports: usize,
    pub board_name: &'static str,
}

#[derive(Serialize)]
struct ValuesPayload<'a> {
    values: &'a ValueList,
}

/// Response to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `{code, message}`
    Message {
        code: ResponseCode,
        message: &'static str,
    },
    /// `{code:"ok", data:{values}}`
    Values(ValueList),
    /// `{code:"ok", data:{ports, default_values, update_time, values}}`
    Config(ConfigSnapshot),
    /// `{code:"ok", data:{ports, default_values, update_time}}`
    DefaultConfig(ConfigDocument),
    /// `{code:"ok", data:{max_ports, board_name}}`
    BoardInfo(BoardInfo),
}

impl Response {
    pub const fn ok() -> Self {
        Self::Message {
            code: ResponseCode::Ok,
            message: messages::OK,
        }
    }

    pub const fn pong() -> Self {
        Self::Message {
            code: ResponseCode::Ok,
            message: messages::PONG,
        }
    }

    pub const fn error(message: &'static str) -> Self {
        Self::Message {
            code: ResponseCode::Err,
            message,
        }
    }

    pub const fn info(message: &'static str) -> Self {
        Self::Message {
            code: ResponseCode::Info,
            message,
        }
    }

    /// Status code of this response
    pub fn code(&self) -> ResponseCode {
        match self {
            Self::Message { code, .. } => *code,
            _ => ResponseCode::Ok,
        }
    }

    /// Encode as one terminated line, returning its length
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, EncodeError> {
        match self {
            Self::Message { code, message } => encode_message(*code, message, buffer),
            Self::Values(values) => {
                encode_data(ResponseCode::Ok, &ValuesPayload { values }, buffer)
            }
            Self::Config(snapshot) => encode_data(ResponseCode::Ok, snapshot, buffer),
            Self::DefaultConfig(document) => encode_data(ResponseCode::Ok, document, buffer),
            Self::BoardInfo(info) => encode_data(ResponseCode::Ok, info, buffer),
        }
    }
}

impl From<ArgError> for Response {
    fn from(e: ArgError) -> Self {
        match e {
            ArgError::Missing => Response::error(messages::BAD_ARGS_COUNT),
            ArgError::Invalid => Response::error(messages::BAD_ARGS),
        }
    }
}
