//! SPI flash device adapter
//!
//! This module provides `SpiFlash`, which wraps a `SpiMaster` and issues
//! the command sequences for each flash operation.

use alloc::vec::Vec;

use crate::chip::{JedecId, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::protocol::{self, PollPolicy, Status};
use crate::spi::AddressWidth;

use super::ChunkPlan;

/// Tunables for a flash adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashConfig {
    /// Busy polling ceiling and delay
    pub poll: PollPolicy,
    /// How payloads are split into commands
    pub chunking: ChunkPlan,
}

/// Flash device adapter for SPI-based programmers
///
/// Borrows the master mutably for its whole lifetime, so nothing else can
/// interleave commands with a running sequence.
///
/// # Example
///
/// ```ignore
/// use tgbprog_core::flash::{FlashConfig, SpiFlash};
///
/// let mut flash = SpiFlash::new(&mut master, FlashConfig::default());
/// flash.check_id(W25Q80DV.id)?;
/// flash.soft_reset()?;
/// flash.page_program(0x1000, &image)?;
/// let back = flash.read_data(0x1000, image.len())?;
/// ```
pub struct SpiFlash<'a, M: SpiMaster + ?Sized> {
    master: &'a mut M,
    config: FlashConfig,
}

impl<'a, M: SpiMaster + ?Sized> SpiFlash<'a, M> {
    /// Create a new adapter around `master`
    pub fn new(master: &'a mut M, config: FlashConfig) -> Self {
        Self { master, config }
    }

    /// Get a reference to the underlying SPI master
    pub fn master(&mut self) -> &mut M {
        self.master
    }

    /// The configuration this adapter was created with
    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<Status> {
        protocol::read_status(self.master)
    }

    /// Poll until BUSY clears, bounded by the configured attempt count
    pub fn wait_ready(&mut self) -> Result<()> {
        protocol::wait_ready(self.master, &self.config.poll)
    }

    /// Set the write enable latch and confirm it took
    pub fn enable_writes(&mut self) -> Result<()> {
        self.wait_ready()?;
        protocol::write_enable(self.master)?;
        let status = self.read_status()?;
        if !status.write_enabled() {
            log::debug!("WEL not set after WRITE_ENABLE (status 0x{:02X})", status.bits());
            return Err(Error::IllegalLatchState {
                expected_wel: true,
                status: status.bits(),
            });
        }
        Ok(())
    }

    /// Clear the write enable latch and confirm it took
    pub fn disable_writes(&mut self) -> Result<()> {
        self.wait_ready()?;
        protocol::write_disable(self.master)?;
        let status = self.read_status()?;
        if status.write_enabled() {
            log::debug!("WEL still set after WRITE_DISABLE (status 0x{:02X})", status.bits());
            return Err(Error::IllegalLatchState {
                expected_wel: false,
                status: status.bits(),
            });
        }
        Ok(())
    }

    /// Read the three identification bytes
    pub fn read_id(&mut self) -> Result<JedecId> {
        let id = protocol::read_jedec_id(self.master)?;
        log::debug!("READ_ID: {:02X} {:02X} {:02X}", id.manufacturer, id.device, id.unique);
        Ok(id)
    }

    /// Read the identity and fail unless it equals `expected` exactly
    pub fn check_id(&mut self, expected: JedecId) -> Result<JedecId> {
        let found = self.read_id()?;
        if found != expected {
            return Err(Error::IdentityMismatch { expected, found });
        }
        Ok(found)
    }

    /// Reset the device to its power-on state and wait until it is idle
    pub fn soft_reset(&mut self) -> Result<()> {
        log::debug!("Soft reset");
        protocol::software_reset(self.master)?;
        self.wait_ready()
    }

    /// Erase the whole array
    ///
    /// Returns once the device reports idle again, which takes seconds on
    /// real parts; size the poll ceiling accordingly.
    pub fn chip_erase(&mut self) -> Result<()> {
        self.enable_writes()?;
        self.wait_ready()?;
        protocol::chip_erase(self.master)?;
        self.wait_ready()
    }

    /// Program `data` starting at `offset`
    pub fn page_program(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.page_program_with(offset, data, |_| {})
    }

    /// Program `data` starting at `offset`, reporting bytes written so far
    /// after each chunk
    ///
    /// Chunk `i` goes to `offset + i * 256` regardless of page alignment;
    /// the write latch is set again for every chunk.
    pub fn page_program_with<F>(&mut self, offset: u32, data: &[u8], mut progress: F) -> Result<()>
    where
        F: FnMut(usize),
    {
        let plan = self.config.chunking;
        check_chunks(plan, offset, data.len())?;

        log::debug!(
            "Programming {} bytes at 0x{:06X} in {} chunk(s)",
            data.len(),
            offset,
            plan.count(data.len())
        );

        for (rel, range) in plan.chunks(data.len()) {
            let addr = offset + rel as u32;
            let chunk = &data[range.clone()];

            self.wait_ready()?;
            self.enable_writes()?;
            log::trace!("PAGE_PROGRAM 0x{:06X} ({} bytes)", addr, chunk.len());
            protocol::program_page_3b(self.master, addr, chunk)?;
            progress(range.end);
        }

        self.wait_ready()?;
        self.disable_writes()
    }

    /// Read `size` bytes starting at `offset`
    pub fn read_data(&mut self, offset: u32, size: usize) -> Result<Vec<u8>> {
        self.read_data_with(offset, size, |_| {})
    }

    /// Read `size` bytes starting at `offset`, reporting bytes read so far
    /// after each chunk
    ///
    /// Every READ_DATA requests a full 256 bytes; the result is trimmed to
    /// `size`.
    pub fn read_data_with<F>(&mut self, offset: u32, size: usize, mut progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize),
    {
        let plan = self.config.chunking;
        check_chunks(plan, offset, size)?;

        let mut out = Vec::with_capacity(plan.count(size) * PAGE_SIZE);
        let mut buf = [0u8; PAGE_SIZE];

        for (rel, range) in plan.chunks(size) {
            let addr = offset + rel as u32;

            self.wait_ready()?;
            log::trace!("READ_DATA 0x{:06X}", addr);
            protocol::read_3b(self.master, addr, &mut buf)?;
            out.extend_from_slice(&buf);
            progress(range.end);
        }

        self.wait_ready()?;
        out.truncate(size);
        Ok(out)
    }
}

/// Check that `len` bytes at `offset` and every command address of `plan`
/// fit in 24 bits
///
/// A trailing empty legacy chunk sits one past the data, so a job ending at
/// 16 MiB would put 0x1000000 on the wire, which encodes as 0x000000.
fn check_chunks(plan: ChunkPlan, offset: u32, len: usize) -> Result<()> {
    let width = AddressWidth::ThreeByte;
    width.check_range(offset, len)?;

    if let Some((rel, _)) = plan.chunks(len).last() {
        if offset as u64 + rel as u64 >= width.max_size() as u64 {
            return Err(Error::AddressOutOfRange { addr: offset, len });
        }
    }
    Ok(())
}
