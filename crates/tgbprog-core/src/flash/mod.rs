//! High-level flash operations
//!
//! [`SpiFlash`] composes the individual SPI25 commands into the sequences
//! the device needs: busy polling around every command, the write-enable
//! latch before every mutating command, and 256-byte chunking for page
//! programming and read-back.

mod chunk;
mod device;

pub use chunk::ChunkPlan;
pub use device::{FlashConfig, SpiFlash};
