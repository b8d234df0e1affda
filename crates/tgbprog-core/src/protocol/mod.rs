//! Protocol implementations
//!
//! This module contains the SPI25 command primitives and the status
//! register polling loop.

mod spi25;

pub use spi25::*;
