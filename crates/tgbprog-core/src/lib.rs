//! tgbprog-core - SPI NOR flash programming engine
//!
//! This crate contains the protocol side of the programmer: the standard
//! SPI25 command set, busy polling, write-enable latch handling, chunked
//! page programming and read-back, identity checking, soft reset and the
//! session orchestrator that ties them together. It is `no_std` and only
//! needs `alloc`.
//!
//! The physical link is abstracted by two traits in [`programmer`]:
//! [`programmer::SpiMaster`] performs one half-duplex exchange and
//! [`programmer::OutputControl`] drives the auxiliary reset line.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the error type
//!
//! # Example
//!
//! ```ignore
//! use tgbprog_core::session::{run_session, NoProgress, ProgramJob, SessionConfig};
//!
//! let jobs = vec![ProgramJob::new("bitstream.bin", 0x0000, bitstream)];
//! let config = SessionConfig { erase: true, verify: true, ..Default::default() };
//! let report = run_session(&mut programmer, &config, &jobs, &mut NoProgress);
//! if !report.is_success() {
//!     for job in report.failures() {
//!         eprintln!("{}", job);
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod error;
pub mod flash;
pub mod programmer;
pub mod protocol;
pub mod session;
pub mod spi;

#[cfg(test)]
mod testing;

pub use error::{Error, Result, TransportError};
