//! Programmer trait definitions
//!
//! A programmer is anything that can shift a command out to the flash,
//! clock a response back in, and drive the auxiliary reset line of the
//! board. Everything is blocking: each call returns once the exchange on
//! the bus has finished.

use alloc::vec::Vec;

use crate::error::{Result, TransportError};
use crate::spi::SpiCommand;

/// SPI Master trait
///
/// This trait represents a programmer that can execute SPI commands. One
/// call is one chip-select cycle: the header and write data of `cmd` are
/// shifted out, then `cmd.read_buf.len()` bytes are read into `read_buf`.
///
/// ## Example
///
/// ```ignore
/// impl SpiMaster for MyAdapter {
///     fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///         execute_with_vec(cmd, |write_data, read_len| {
///             self.transfer(write_data, read_len)
///                 .map_err(|_| TransportError::TransferFailed)
///         })
///     }
///
///     fn delay_us(&mut self, us: u32) {
///         std::thread::sleep(std::time::Duration::from_micros(us as u64));
///     }
/// }
/// ```
pub trait SpiMaster {
    /// Execute a single SPI command
    ///
    /// The command contains all the information needed for the transaction:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional address (with width)
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read data into
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Level driven onto an auxiliary output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineLevel {
    /// Actively driven low
    Low,
    /// Actively driven high
    High,
    /// Not driven (input / high impedance), left to the board's pull-up
    Released,
}

/// Control over the programmer's auxiliary output lines
///
/// The session uses one line as the board reset: driving it low holds the
/// FPGA that shares the SPI bus in reset, releasing it lets it boot.
pub trait OutputControl {
    /// Drive `line` to `level`
    ///
    /// The meaning of `line` is backend specific (for FTDI MPSSE it is the
    /// ADBUS bit number).
    fn set_output(&mut self, line: u8, level: LineLevel) -> Result<()>;
}

/// A complete programmer: SPI access plus reset-line control
pub trait Programmer: SpiMaster + OutputControl {}

impl<T: SpiMaster + OutputControl + ?Sized> Programmer for T {}

/// Helper function for implementing `SpiMaster::execute()` when the
/// internal transfer method returns a `Vec<u8>` instead of writing
/// directly into the read buffer.
///
/// Builds the outgoing byte stream from the command header and write data,
/// hands it to `transfer_fn` together with the number of bytes to read, and
/// copies the response into the command's read buffer.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///     execute_with_vec(cmd, |write_data, read_len| {
///         self.spi_transfer(write_data, read_len)
///             .map_err(|_| TransportError::TransferFailed)
///     })
/// }
/// ```
pub fn execute_with_vec<F>(cmd: &mut SpiCommand<'_>, transfer_fn: F) -> Result<()>
where
    F: FnOnce(&[u8], usize) -> core::result::Result<Vec<u8>, TransportError>,
{
    let write_data = cmd.to_bytes();
    let read_len = cmd.read_buf.len();

    let result = transfer_fn(&write_data, read_len)?;
    if result.len() < read_len {
        return Err(TransportError::ShortRead {
            expected: read_len,
            got: result.len(),
        }
        .into());
    }
    cmd.read_buf.copy_from_slice(&result[..read_len]);

    Ok(())
}

/// Information about a programmer
#[derive(Debug, Clone)]
pub struct ProgrammerInfo {
    /// Name of the programmer
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
}
