//! Configuration types and persistence
//!
//! The configuration lives in RAM as a [`Configuration`] and in flash as a
//! postcard-encoded, versioned [`ConfigDocument`].

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
