//! tgbprog-ftdi - FTDI MPSSE programmer support
//!
//! This crate drives a SPI NOR flash through the MPSSE engine of an FTDI
//! high-speed bridge (FT2232H, FT4232H, FT232H, FT4233H) in SPI mode 0, and
//! uses one GPIOL pin as the reset line of the board the flash sits on.
//!
//! # Example
//!
//! ```no_run
//! use tgbprog_ftdi::{Ftdi, FtdiConfig, FtdiDeviceType, FtdiInterface};
//! use tgbprog_core::protocol;
//!
//! let config = FtdiConfig::for_device(FtdiDeviceType::Ft2232H)
//!     .interface(FtdiInterface::A)?
//!     .divisor(10)?;
//! let mut ftdi = Ftdi::open(&config)?;
//!
//! let id = protocol::read_jedec_id(&mut ftdi)?;
//! println!("JEDEC ID: {}", id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Programmer Options
//!
//! When using the CLI, the following options are available:
//!
//! - `type=<device>` - Device type (2232h, 4232h, 232h, 4233h; default: 2232h)
//! - `port=<A|B|C|D>` - Channel to use (default: A)
//! - `divisor=<N>` - Clock divisor (2-65534, even; default: 10)
//! - `reset=gpiol<N>` - GPIOL pin wired to the board reset (default: gpiol0)
//!
//! # SPI Clock Speed
//!
//! The SPI clock is derived from the 60 MHz base clock:
//!
//! ```text
//! SPI_clock = 60 MHz / divisor
//! ```
//!
//! | Divisor | SPI Clock |
//! |---------|-----------|
//! | 2       | 30 MHz    |
//! | 4       | 15 MHz    |
//! | 10      | 6 MHz     |
//! | 60      | 1 MHz     |

mod device;
mod error;
mod protocol;

pub use device::{parse_options, Ftdi, FtdiConfig};
pub use error::{FtdiError, Result};
pub use protocol::{FtdiDeviceType, FtdiInterface, PinState};
