//! SPI25 protocol implementation
//!
//! This module implements the individual SPI flash commands and the status
//! register polling loop. Each function issues exactly the exchanges its
//! name says and nothing else; sequencing (latch handling, waiting between
//! commands) is done by [`crate::flash::SpiFlash`].

use bitflags::bitflags;

use crate::chip::JedecId;
use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{opcodes, SpiCommand};

bitflags! {
    /// Status register 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Erase or program in progress
        const BUSY = opcodes::SR1_WIP;
        /// Write Enable Latch
        const WEL = opcodes::SR1_WEL;
        /// Block protect bits
        const BP = 0b0001_1100;
        /// Top/bottom protect
        const TB = 1 << 5;
        /// Sector/block protect
        const SEC = 1 << 6;
        /// Status register protect 0
        const SRP0 = 1 << 7;
    }
}

impl Status {
    /// Returns true while an erase or program is running
    pub fn is_busy(self) -> bool {
        self.contains(Status::BUSY)
    }

    /// Returns true if the write enable latch is set
    pub fn write_enabled(self) -> bool {
        self.contains(Status::WEL)
    }
}

/// Default ceiling on status polls before giving up
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20_000;

/// How `wait_ready` polls the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Number of status reads before `BusyTimeout`
    pub max_attempts: u32,
    /// Delay after each busy read, in microseconds (0 = tight loop)
    pub delay_us: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            delay_us: 0,
        }
    }
}

/// Read the JEDEC ID from a flash chip
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<JedecId> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;
    Ok(JedecId::from_bytes(buf))
}

/// Read the status register 1
pub fn read_status<M: SpiMaster + ?Sized>(master: &mut M) -> Result<Status> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(Status::from_bits_retain(buf[0]))
}

/// Wait for the BUSY bit to clear
///
/// Reads the status register up to `policy.max_attempts` times and returns
/// as soon as one read shows BUSY clear. Fails with `BusyTimeout` after the
/// last attempt; no read is issued beyond the ceiling.
pub fn wait_ready<M: SpiMaster + ?Sized>(master: &mut M, policy: &PollPolicy) -> Result<()> {
    for attempt in 1..=policy.max_attempts {
        let status = read_status(master)?;
        if !status.is_busy() {
            if attempt > 1 {
                log::trace!("Ready after {} polls", attempt);
            }
            return Ok(());
        }
        if policy.delay_us > 0 {
            master.delay_us(policy.delay_us);
        }
    }

    Err(Error::BusyTimeout {
        attempts: policy.max_attempts,
    })
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    master.execute(&mut cmd)
}

/// Send the software reset sequence
///
/// Reset Enable and Reset go out back to back; any other command between
/// them cancels the reset on the device.
pub fn software_reset<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::RSTEN);
    master.execute(&mut cmd)?;
    let mut cmd = SpiCommand::simple(opcodes::RST);
    master.execute(&mut cmd)?;
    // tRST: the device ignores commands for ~30us after a reset
    master.delay_us(30);
    Ok(())
}

/// Send the Chip Erase command
pub fn chip_erase<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::CE_60);
    master.execute(&mut cmd)
}

/// Send one Page Program command with a 3-byte address
///
/// The device latches at most one page; the caller splits larger buffers.
pub fn program_page_3b<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
    master.execute(&mut cmd)
}

/// Send one Read Data command with a 3-byte address, filling `buf`
pub fn read_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    let mut cmd = SpiCommand::read_3b(opcodes::READ, addr, buf);
    master.execute(&mut cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Exchange, ScriptedMaster};

    #[test]
    fn test_ready_on_first_poll() {
        for status in [0x00u8, 0x02, 0xFC, 0xFE] {
            let mut master = ScriptedMaster::new().with_status([status]);
            wait_ready(&mut master, &PollPolicy::default()).unwrap();
            assert_eq!(master.status_reads(), 1);
        }
    }

    #[test]
    fn test_ready_after_busy_polls() {
        let mut master = ScriptedMaster::new().with_status([0x01, 0x03, 0x01, 0x00]);
        wait_ready(&mut master, &PollPolicy::default()).unwrap();
        assert_eq!(master.status_reads(), 4);
    }

    #[test]
    fn test_busy_timeout_exact_attempts() {
        let mut master = ScriptedMaster::new().stuck_busy();
        let policy = PollPolicy {
            max_attempts: 37,
            delay_us: 0,
        };
        let err = wait_ready(&mut master, &policy).unwrap_err();
        assert_eq!(err, Error::BusyTimeout { attempts: 37 });
        assert_eq!(master.status_reads(), 37);
    }

    #[test]
    fn test_poll_delay_only_between_busy_reads() {
        let mut master = ScriptedMaster::new().with_status([0x01, 0x01, 0x00]);
        let policy = PollPolicy {
            max_attempts: 10,
            delay_us: 5,
        };
        wait_ready(&mut master, &policy).unwrap();
        assert_eq!(master.delays(), &[5, 5]);
    }

    #[test]
    fn test_read_jedec_id() {
        let mut master = ScriptedMaster::new().with_id([0xEF, 0x40, 0x14]);
        let id = read_jedec_id(&mut master).unwrap();
        assert_eq!(id, JedecId::new(0xEF, 0x40, 0x14));
        assert_eq!(master.log(), &[Exchange::new(&[0x9F], 3)]);
    }

    #[test]
    fn test_software_reset_is_adjacent() {
        let mut master = ScriptedMaster::new();
        software_reset(&mut master).unwrap();
        assert_eq!(
            master.log(),
            &[Exchange::new(&[0x66], 0), Exchange::new(&[0x99], 0)]
        );
    }

    #[test]
    fn test_status_flags() {
        let s = Status::from_bits_retain(0x03);
        assert!(s.is_busy());
        assert!(s.write_enabled());
        assert!(!Status::from_bits_retain(0xFC).is_busy());
    }
}
