//! Duty Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the firmware core is
//! written against. Chip-specific HALs implement them, and host tests
//! implement them with in-memory doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  duty-core (store, channels, commands)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  duty-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ duty-hal-     │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::FlashStorage`] - Persistent key-value storage
//! - [`pwm::PwmDriver`] - Per-pin PWM output

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod pwm;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use pwm::{PwmDriver, PwmError};
