//! RP2040-specific HAL for the PWM output firmware
//!
//! Implements the shared `duty-hal` traits on RP2040:
//!
//! - Flash storage driver (implements `duty_hal::FlashStorage`)
//! - Runtime-routed PWM outputs (implements `duty_hal::PwmDriver`)

#![no_std]

pub mod flash;
pub mod pwm;
