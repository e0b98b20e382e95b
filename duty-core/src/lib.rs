//! Board-agnostic core logic for the PWM output firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Configuration types, validation and flash persistence
//! - Output channel provisioning and duty level mapping
//! - Command handlers and the dispatcher
//! - The controller tying store, channels and commands together

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod config;
pub mod controller;
pub mod output;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{Controller, Handled};
