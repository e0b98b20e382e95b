//! Request dispatch
//!
//! [`dispatch`] routes a parsed [`Command`] to its handler and returns an
//! [`Outcome`]: the response plus the configuration change to commit.
//! Rejected requests always carry [`Change::None`].

pub mod args;
mod handlers;
pub mod response;

pub use args::ArgError;
pub use response::{BoardInfo, Response};

use duty_protocol::{Command, Verb};

use crate::config::{ConfigDocument, Configuration};

/// Configuration change produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing to commit
    None,
    /// Replace the in-memory configuration only (live values)
    Live(Configuration),
    /// Replace and write to flash
    Persist(Configuration),
    /// Replace, write to flash and re-provision outputs
    Rebuild(Configuration),
    /// Load a validated document through the store, then write to flash
    /// and re-provision outputs
    Reload(ConfigDocument),
}

impl Change {
    pub fn persists(&self) -> bool {
        matches!(self, Change::Persist(_) | Change::Rebuild(_) | Change::Reload(_))
    }

    pub fn rebuilds(&self) -> bool {
        matches!(self, Change::Rebuild(_) | Change::Reload(_))
    }
}

/// Handler result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    pub change: Change,
}

impl Outcome {
    pub fn new(response: Response, change: Change) -> Self {
        Self { response, change }
    }

    /// Response without a configuration change
    pub fn respond(response: Response) -> Self {
        Self::new(response, Change::None)
    }
}

impl From<ArgError> for Outcome {
    fn from(e: ArgError) -> Self {
        Outcome::respond(e.into())
    }
}

/// Route a command to its handler
pub fn dispatch(config: &Configuration, command: &Command, board: &BoardInfo) -> Outcome {
    let result = match command.verb() {
        Verb::SetValue => handlers::set_value(config, command),
        Verb::PortsSetup => handlers::ports_setup(config, command),
        Verb::GetValue => handlers::get_value(config),
        Verb::GetConfig => handlers::get_config(config),
        Verb::SetConfig => handlers::set_config(config, command),
        Verb::GetDefaultConfig => handlers::get_default_config(),
        Verb::LoadDefaultConfig => handlers::load_default_config(),
        Verb::SetDefaultValue => handlers::set_default_value(config, command),
        Verb::SetUpdateTime => handlers::set_update_time(config, command),
        Verb::Ping => handlers::ping(),
        Verb::BoardInfo => handlers::board_info(board),
    };
    result.unwrap_or_else(Outcome::from)
}
