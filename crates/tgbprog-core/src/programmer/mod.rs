//! Programmer traits and abstractions
//!
//! This module defines the transport contract that programmers implement
//! to talk to the flash chip.

mod traits;

pub use traits::*;
