//! SPI types and command structures
//!
//! This module provides the command set understood by the flash and the
//! `SpiCommand` structure handed to transports.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use opcodes::*;
