//! One handler per verb
//!
//! Handlers never touch storage or hardware. They validate against the
//! current configuration and describe the resulting change.

use duty_protocol::Command;

use crate::config::{CandidateDocument, ConfigDocument, Configuration, PortList};

use super::args::{self, ArgError};
use super::response::{BoardInfo, Response};
use super::{Change, Outcome};

type HandlerResult = Result<Outcome, ArgError>;

pub fn set_value(config: &Configuration, command: &Command) -> HandlerResult {
    args::require(command, 2)?;
    let index = args::index(args::text(command, 0)?, config.len())?;
    let value = args::percent(args::text(command, 1)?)?;

    let mut next = config.clone();
    next.set_value(index, value)?;
    Ok(Outcome::new(Response::ok(), Change::Live(next)))
}

pub fn ports_setup(config: &Configuration, command: &Command) -> HandlerResult {
    args::require(command, 1)?;
    let mut ports = PortList::new();
    for raw in command.args() {
        let port = args::port(raw)?;
        ports.push(port).map_err(|_| ArgError::Invalid)?;
    }

    let mut next = config.clone();
    next.set_ports(&ports)?;
    Ok(Outcome::new(Response::ok(), Change::Rebuild(next)))
}

pub fn get_value(config: &Configuration) -> HandlerResult {
    Ok(Outcome::respond(Response::Values(config.snapshot().values)))
}

pub fn get_config(config: &Configuration) -> HandlerResult {
    Ok(Outcome::respond(Response::Config(config.snapshot())))
}

pub fn set_config(config: &Configuration, command: &Command) -> HandlerResult {
    args::require(command, 1)?;
    let document = CandidateDocument::parse(args::text(command, 0)?)?
        .into_document(config.update_time())?;
    document.validate()?;
    Ok(Outcome::new(Response::ok(), Change::Reload(document)))
}

pub fn get_default_config() -> HandlerResult {
    Ok(Outcome::respond(Response::DefaultConfig(
        ConfigDocument::canonical(),
    )))
}

pub fn load_default_config() -> HandlerResult {
    Ok(Outcome::new(
        Response::ok(),
        Change::Rebuild(Configuration::canonical()),
    ))
}

pub fn set_default_value(config: &Configuration, command: &Command) -> HandlerResult {
    args::require(command, 2)?;
    let index = args::index(args::text(command, 0)?, config.len())?;
    let value = args::percent(args::text(command, 1)?)?;

    let mut next = config.clone();
    next.set_default_value(index, value)?;
    Ok(Outcome::new(Response::ok(), Change::Persist(next)))
}

pub fn set_update_time(config: &Configuration, command: &Command) -> HandlerResult {
    args::require(command, 1)?;
    let ms = args::millis(args::text(command, 0)?)?;

    let mut next = config.clone();
    next.set_update_time(ms);
    Ok(Outcome::new(Response::ok(), Change::Persist(next)))
}

pub fn ping() -> HandlerResult {
    Ok(Outcome::respond(Response::pong()))
}

pub fn board_info(board: &BoardInfo) -> HandlerResult {
    Ok(Outcome::respond(Response::BoardInfo(*board)))
}
