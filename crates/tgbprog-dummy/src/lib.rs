//! tgbprog-dummy - In-memory flash emulator for testing
//!
//! This crate provides a dummy programmer that emulates a W25Q-style SPI
//! NOR flash in memory, together with the board reset line. It follows the
//! device rules that matter for a programmer: BUSY after program, erase and
//! reset; commands ignored while busy; PAGE_PROGRAM and CHIP_ERASE only
//! accepted with WEL set; programming can only clear bits and wraps inside
//! the page; reset needs RSTEN immediately before RST.
//!
//! Every exchange and line change is recorded so tests can check the exact
//! traffic, and a few faults can be injected.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use tgbprog_core::chip::{JedecId, PAGE_SIZE, W25Q80DV};
use tgbprog_core::error::{Result, TransportError};
use tgbprog_core::programmer::{LineLevel, OutputControl, SpiMaster};
use tgbprog_core::spi::{opcodes, Command, SpiCommand};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// READ_ID response
    pub jedec: JedecId,
    /// Flash size in bytes
    pub size: usize,
    /// Status reads that report BUSY after each program, erase or reset
    pub busy_polls: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            jedec: W25Q80DV.id,
            size: W25Q80DV.total_size as usize,
            busy_polls: 0,
        }
    }
}

/// One observable action on the emulated programmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A chip-select cycle
    Spi {
        /// Opcode byte
        opcode: u8,
        /// Address, for commands that carry one
        address: Option<u32>,
        /// Payload bytes after the header
        write_len: usize,
        /// Bytes clocked in
        read_len: usize,
    },
    /// An auxiliary line changed
    Output {
        /// Line number
        line: u8,
        /// New level
        level: LineLevel,
    },
}

/// Dummy flash programmer
///
/// Emulates a flash chip in memory for testing purposes.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    write_enabled: bool,
    busy_remaining: u32,
    reset_armed: bool,
    resets: u32,
    dropped: u32,
    lines: BTreeMap<u8, LineLevel>,
    events: Vec<Event>,

    stuck_busy: bool,
    ignore_wren: bool,
    corrupt: Vec<u32>,
    fail_opcode: Option<u8>,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration, fully erased
    ///
    /// The size is rounded up to a whole number of pages, at least one.
    pub fn new(mut config: DummyConfig) -> Self {
        let size = config.size.max(PAGE_SIZE).next_multiple_of(PAGE_SIZE);
        if size != config.size {
            log::warn!(
                "dummy: size {} is not a whole number of pages, using {}",
                config.size,
                size
            );
            config.size = size;
        }
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            write_enabled: false,
            busy_remaining: 0,
            reset_armed: false,
            resets: 0,
            dropped: 0,
            lines: BTreeMap::new(),
            events: Vec::new(),
            stuck_busy: false,
            ignore_wren: false,
            corrupt: Vec::new(),
            fail_opcode: None,
        }
    }

    /// Create a new dummy flash with default configuration (W25Q80DV)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Report BUSY on every status read and ignore everything else
    pub fn stuck_busy(mut self) -> Self {
        self.stuck_busy = true;
        self
    }

    /// Accept WRITE_ENABLE without ever setting WEL
    pub fn ignore_write_enable(mut self) -> Self {
        self.ignore_wren = true;
        self
    }

    /// Flip the lowest bit of the byte at `addr` whenever it is read
    pub fn corrupt_read(mut self, addr: u32) -> Self {
        self.corrupt.push(addr);
        self
    }

    /// Fail every exchange with `opcode` at the transport level
    pub fn fail_on(mut self, opcode: u8) -> Self {
        self.fail_opcode = Some(opcode);
        self
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Everything that happened, in order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// `(address, payload length)` of every PAGE_PROGRAM sent
    pub fn page_programs(&self) -> Vec<(u32, usize)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Spi {
                    opcode: opcodes::PP,
                    address: Some(addr),
                    write_len,
                    ..
                } => Some((addr, write_len)),
                _ => None,
            })
            .collect()
    }

    /// Number of completed soft resets
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Commands the device ignored (busy, or mutating without WEL)
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Current level of `line`, `Released` if it was never driven
    pub fn line(&self, line: u8) -> LineLevel {
        self.lines.get(&line).copied().unwrap_or(LineLevel::Released)
    }

    /// Returns true if the write enable latch is set
    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    fn status(&mut self) -> u8 {
        let busy = if self.stuck_busy || self.busy_remaining > 0 {
            self.busy_remaining = self.busy_remaining.saturating_sub(1);
            opcodes::SR1_WIP
        } else {
            0
        };
        let wel = if self.write_enabled {
            opcodes::SR1_WEL
        } else {
            0
        };
        busy | wel
    }

    fn is_busy(&self) -> bool {
        self.stuck_busy || self.busy_remaining > 0
    }

    fn start_busy(&mut self) {
        self.busy_remaining = self.config.busy_polls;
    }

    fn drop_command(&mut self, opcode: u8, why: &str) {
        log::warn!("dummy: ignoring opcode 0x{:02X}: {}", opcode, why);
        self.dropped += 1;
    }

    fn wrap(&self, addr: u32) -> usize {
        addr as usize % self.data.len()
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>) {
        let start = cmd.address.unwrap_or(0);
        for (i, byte) in cmd.read_buf.iter_mut().enumerate() {
            let addr = start.wrapping_add(i as u32);
            let mut value = self.data[addr as usize % self.data.len()];
            if self.corrupt.contains(&addr) {
                value ^= 0x01;
            }
            *byte = value;
        }
    }

    fn handle_page_program(&mut self, cmd: &SpiCommand<'_>) {
        let addr = self.wrap(cmd.address.unwrap_or(0));
        let page = addr & !(PAGE_SIZE - 1);
        let column = addr % PAGE_SIZE;

        // The page buffer only latches the last 256 bytes sent
        let mut latch = [None; PAGE_SIZE];
        for (i, &byte) in cmd.write_data.iter().enumerate() {
            latch[(column + i) % PAGE_SIZE] = Some(byte);
        }

        // Flash programming: can only change 1 -> 0
        for (col, byte) in latch.iter().enumerate() {
            if let Some(b) = byte {
                self.data[page + col] &= b;
            }
        }

        self.write_enabled = false;
        self.start_busy();
    }

    fn handle_chip_erase(&mut self) {
        self.data.fill(0xFF);
        self.write_enabled = false;
        self.start_busy();
    }
}

impl SpiMaster for DummyFlash {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.events.push(Event::Spi {
            opcode: cmd.opcode,
            address: cmd.address,
            write_len: cmd.write_data.len(),
            read_len: cmd.read_buf.len(),
        });

        if self.fail_opcode == Some(cmd.opcode) {
            return Err(TransportError::TransferFailed.into());
        }

        let Some(command) = Command::from_opcode(cmd.opcode) else {
            log::error!("dummy: unsupported opcode 0x{:02X}", cmd.opcode);
            return Err(TransportError::Rejected.into());
        };
        log::trace!("dummy: {}", command.name());

        let armed = core::mem::take(&mut self.reset_armed);

        if command == Command::ReadStatus {
            let status = self.status();
            cmd.read_buf.fill(status);
            return Ok(());
        }

        if self.is_busy() {
            self.drop_command(cmd.opcode, "device busy");
            cmd.read_buf.fill(0xFF);
            return Ok(());
        }

        if command.is_mutating() && !self.write_enabled {
            self.drop_command(cmd.opcode, "WEL not set");
            return Ok(());
        }

        match command {
            Command::ReadId => {
                let id = self.config.jedec.to_bytes();
                for (dst, src) in cmd.read_buf.iter_mut().zip(id.iter().cycle()) {
                    *dst = *src;
                }
            }
            Command::WriteEnable => {
                if !self.ignore_wren {
                    self.write_enabled = true;
                }
            }
            Command::WriteDisable => self.write_enabled = false,
            Command::ReadData => self.handle_read(cmd),
            Command::PageProgram => self.handle_page_program(cmd),
            Command::ChipErase => self.handle_chip_erase(),
            Command::SoftResetEnable => self.reset_armed = true,
            Command::SoftReset => {
                if armed {
                    self.write_enabled = false;
                    self.resets += 1;
                    self.start_busy();
                } else {
                    self.drop_command(cmd.opcode, "reset not enabled");
                }
            }
            Command::ReadStatus => {}
        }

        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

impl OutputControl for DummyFlash {
    fn set_output(&mut self, line: u8, level: LineLevel) -> Result<()> {
        self.lines.insert(line, level);
        self.events.push(Event::Output { line, level });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgbprog_core::error::Error;
    use tgbprog_core::flash::{ChunkPlan, FlashConfig, SpiFlash};
    use tgbprog_core::protocol::{self, PollPolicy};
    use tgbprog_core::session::{
        run_session, JobOutcome, NoProgress, ProgramJob, SessionConfig, DEFAULT_RESET_LINE,
    };

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn spi_opcodes(flash: &DummyFlash) -> Vec<u8> {
        flash
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Spi { opcode, .. } if *opcode != opcodes::RDSR => Some(*opcode),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut flash = DummyFlash::new_default();
        let id = protocol::read_jedec_id(&mut flash).unwrap();
        assert_eq!(id, JedecId::new(0xEF, 0x40, 0x14));
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = DummyFlash::new_default();
        for value in [0xF0u8, 0x3C] {
            protocol::write_enable(&mut flash).unwrap();
            protocol::program_page_3b(&mut flash, 0x10, &[value]).unwrap();
        }
        assert_eq!(flash.data()[0x10], 0x30);
    }

    #[test]
    fn test_program_without_wel_is_ignored() {
        let mut flash = DummyFlash::new_default();
        protocol::program_page_3b(&mut flash, 0, &[0x00]).unwrap();
        assert_eq!(flash.data()[0], 0xFF);
        assert_eq!(flash.dropped(), 1);
    }

    #[test]
    fn test_wel_clears_after_program() {
        let mut flash = DummyFlash::new_default();
        protocol::write_enable(&mut flash).unwrap();
        assert!(flash.write_enabled());
        protocol::program_page_3b(&mut flash, 0, &[0x00]).unwrap();
        assert!(!flash.write_enabled());
    }

    #[test]
    fn test_program_wraps_within_page() {
        let mut flash = DummyFlash::new_default();
        protocol::write_enable(&mut flash).unwrap();
        protocol::program_page_3b(&mut flash, 0x1FE, &[0x01, 0x02, 0x03, 0x04]).unwrap();
        let data = flash.data();
        assert_eq!(&data[0x1FE..0x200], &[0x01, 0x02]);
        assert_eq!(&data[0x100..0x102], &[0x03, 0x04]);
        assert_eq!(data[0x200], 0xFF);
    }

    #[test]
    fn test_read_wraps_at_end() {
        let config = DummyConfig {
            size: 0x1000,
            ..Default::default()
        };
        let mut init = vec![0xFF; 0x1000];
        init[0xFFF] = 0x12;
        init[0] = 0x34;
        let mut flash = DummyFlash::with_data(config, &init);
        let mut buf = [0u8; 2];
        protocol::read_3b(&mut flash, 0xFFF, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn test_reset_needs_adjacent_enable() {
        let mut flash = DummyFlash::new_default();
        protocol::software_reset(&mut flash).unwrap();
        assert_eq!(flash.resets(), 1);

        protocol::write_enable(&mut flash).unwrap();
        let mut cmd = SpiCommand::simple(opcodes::RSTEN);
        flash.execute(&mut cmd).unwrap();
        protocol::read_status(&mut flash).unwrap();
        let mut cmd = SpiCommand::simple(opcodes::RST);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(flash.resets(), 1);
        assert!(flash.write_enabled());
    }

    #[test]
    fn test_size_rounded_to_pages() {
        let mut flash = DummyFlash::new(DummyConfig {
            size: 1000,
            ..Default::default()
        });
        assert_eq!(flash.data().len(), 1024);
        protocol::write_enable(&mut flash).unwrap();
        protocol::program_page_3b(&mut flash, 0x300, &[0; 256]).unwrap();
        assert!(flash.data()[0x300..0x400].iter().all(|&b| b == 0));

        let mut empty = DummyFlash::new(DummyConfig {
            size: 0,
            ..Default::default()
        });
        assert_eq!(empty.data().len(), PAGE_SIZE);
        let mut buf = [0u8; 4];
        protocol::read_3b(&mut empty, 0x1234, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let mut flash = DummyFlash::new_default();
        let mut buf = [0u8; 4];
        // FAST_READ is not part of the emulated command set
        let mut cmd = SpiCommand::read_3b(0x0B, 0, &mut buf);
        assert_eq!(
            flash.execute(&mut cmd),
            Err(Error::Transport(TransportError::Rejected))
        );
    }

    #[test]
    fn test_commands_ignored_while_busy() {
        let config = DummyConfig {
            busy_polls: 2,
            ..Default::default()
        };
        let mut flash = DummyFlash::new(config);
        protocol::write_enable(&mut flash).unwrap();
        protocol::program_page_3b(&mut flash, 0, &[0x00]).unwrap();
        protocol::write_enable(&mut flash).unwrap();
        assert!(!flash.write_enabled());
        assert_eq!(flash.dropped(), 1);

        protocol::wait_ready(&mut flash, &PollPolicy::default()).unwrap();
        protocol::write_enable(&mut flash).unwrap();
        assert!(flash.write_enabled());
    }

    #[test]
    fn test_flash_read_back_matches() {
        let image = pattern(1000, 7);
        let mut flash = DummyFlash::new(DummyConfig {
            busy_polls: 3,
            ..Default::default()
        });
        let mut dev = SpiFlash::new(&mut flash, FlashConfig::default());
        dev.page_program(0x4000, &image).unwrap();
        let back = dev.read_data(0x4000, image.len()).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn test_chunk_boundary_both_plans() {
        let image = pattern(512, 1);
        for (plan, expected) in [
            (ChunkPlan::Exact, vec![(0x0, 256), (0x100, 256)]),
            (ChunkPlan::Legacy, vec![(0x0, 256), (0x100, 256), (0x200, 0)]),
        ] {
            let mut flash = DummyFlash::new_default();
            let config = FlashConfig {
                chunking: plan,
                ..Default::default()
            };
            let mut dev = SpiFlash::new(&mut flash, config);
            dev.page_program(0, &image).unwrap();
            assert_eq!(dev.read_data(0, 512).unwrap(), image);
            assert_eq!(flash.page_programs(), expected);
            assert!(flash.data()[0x200..0x300].iter().all(|&b| b == 0xFF));
        }
    }

    #[test]
    fn test_session_erase_program_verify_300_bytes() {
        let image = pattern(300, 3);
        let mut flash = DummyFlash::new_default();
        flash.data_mut()[0x1000..0x1010].fill(0x00);

        let config = SessionConfig {
            erase: true,
            verify: true,
            ..Default::default()
        };
        let jobs = [ProgramJob::new("image.bin", 0x1000, image.clone())];
        let report = run_session(&mut flash, &config, &jobs, &mut NoProgress);

        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.jobs[0].outcome, JobOutcome::Verified);
        assert_eq!(flash.page_programs(), [(0x1000, 256), (0x1100, 44)]);
        assert_eq!(&flash.data()[0x1000..0x1000 + 300], &image[..]);
        assert_eq!(
            spi_opcodes(&flash)[..4],
            [opcodes::RDID, opcodes::RSTEN, opcodes::RST, opcodes::WREN]
        );
        assert!(spi_opcodes(&flash).contains(&opcodes::CE_60));
    }

    #[test]
    fn test_session_unaligned_job_within_page() {
        let mut flash = DummyFlash::new_default();
        let config = SessionConfig {
            verify: true,
            ..Default::default()
        };
        let jobs = [ProgramJob::new("cfg.bin", 0x1010, vec![0xA5; 16])];
        let report = run_session(&mut flash, &config, &jobs, &mut NoProgress);

        assert!(report.is_success(), "{:?}", report.fatal);
        assert_eq!(report.jobs[0].outcome, JobOutcome::Verified);
        assert_eq!(flash.page_programs(), [(0x1010, 16)]);
        assert_eq!(&flash.data()[0x1010..0x1020], &[0xA5; 16]);
        assert_eq!(flash.data()[0x100F], 0xFF);
        assert_eq!(flash.data()[0x1020], 0xFF);
    }

    #[test]
    fn test_session_second_job_mismatch() {
        let a = pattern(0x100, 1);
        let b = pattern(0x180, 2);
        let mut flash = DummyFlash::new_default().corrupt_read(0x2005);

        let config = SessionConfig {
            erase: true,
            verify: true,
            ..Default::default()
        };
        let jobs = [
            ProgramJob::new("a.bin", 0x0000, a),
            ProgramJob::new("b.bin", 0x2000, b.clone()),
        ];
        let report = run_session(&mut flash, &config, &jobs, &mut NoProgress);

        assert!(!report.is_success());
        assert_eq!(report.fatal, None);
        assert_eq!(report.jobs[0].outcome, JobOutcome::Verified);
        assert_eq!(
            report.jobs[1].outcome,
            JobOutcome::Failed(Error::VerificationMismatch {
                addr: 0x2005,
                expected: b[5],
                found: b[5] ^ 0x01,
                mismatched: 1
            })
        );
        assert_eq!(report.failures().count(), 1);
        assert_eq!(flash.line(DEFAULT_RESET_LINE), LineLevel::Released);
    }

    #[test]
    fn test_session_reset_line_on_identity_mismatch() {
        let mut flash = DummyFlash::new(DummyConfig {
            jedec: JedecId::new(0xEF, 0x40, 0x15),
            ..Default::default()
        });
        let jobs = [ProgramJob::new("a.bin", 0, vec![0; 16])];
        let report = run_session(&mut flash, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert_eq!(
            report.fatal,
            Some(Error::IdentityMismatch {
                expected: W25Q80DV.id,
                found: JedecId::new(0xEF, 0x40, 0x15)
            })
        );

        let events = flash.events();
        assert_eq!(
            events.first(),
            Some(&Event::Output {
                line: DEFAULT_RESET_LINE,
                level: LineLevel::Low
            })
        );
        assert!(matches!(events[1], Event::Spi { opcode: opcodes::RDID, .. }));
        let releases = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::Output {
                        level: LineLevel::Released,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(releases, 1);
        assert_eq!(
            events.last(),
            Some(&Event::Output {
                line: DEFAULT_RESET_LINE,
                level: LineLevel::Released
            })
        );
        assert!(flash.data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_stuck_busy_times_out() {
        let mut flash = DummyFlash::new_default().stuck_busy();
        let policy = PollPolicy {
            max_attempts: 25,
            delay_us: 0,
        };
        let err = protocol::wait_ready(&mut flash, &policy).unwrap_err();
        assert_eq!(err, Error::BusyTimeout { attempts: 25 });
        assert_eq!(flash.events().len(), 25);
    }

    #[test]
    fn test_session_busy_timeout_is_fatal() {
        // The soft reset leaves the part BUSY for longer than the poll ceiling
        let mut flash = DummyFlash::new(DummyConfig {
            busy_polls: u32::MAX,
            ..Default::default()
        });
        let mut config = SessionConfig::default();
        config.flash.poll = PollPolicy {
            max_attempts: 50,
            delay_us: 0,
        };
        let jobs = [ProgramJob::new("a.bin", 0, vec![0; 16])];
        let report = run_session(&mut flash, &config, &jobs, &mut NoProgress);

        assert_eq!(report.fatal, Some(Error::BusyTimeout { attempts: 50 }));
        assert_eq!(report.jobs[0].outcome, JobOutcome::NotAttempted);
        assert_eq!(flash.line(DEFAULT_RESET_LINE), LineLevel::Released);
    }

    #[test]
    fn test_session_latch_failure() {
        let mut flash = DummyFlash::new_default().ignore_write_enable();
        let jobs = [ProgramJob::new("a.bin", 0, vec![0; 16])];
        let report = run_session(&mut flash, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert_eq!(
            report.jobs[0].outcome,
            JobOutcome::Failed(Error::IllegalLatchState {
                expected_wel: true,
                status: 0x00
            })
        );
        assert!(report.fatal.is_some());
        assert!(flash.page_programs().is_empty());
    }

    #[test]
    fn test_session_legacy_plan_end_to_end() {
        let image = pattern(0x200, 9);
        let mut flash = DummyFlash::new_default();
        let mut config = SessionConfig {
            verify: true,
            ..Default::default()
        };
        config.flash.chunking = ChunkPlan::Legacy;
        let jobs = [ProgramJob::new("a.bin", 0x8000, image.clone())];
        let report = run_session(&mut flash, &config, &jobs, &mut NoProgress);

        assert!(report.is_success());
        assert_eq!(
            flash.page_programs(),
            [(0x8000, 256), (0x8100, 256), (0x8200, 0)]
        );
        assert_eq!(&flash.data()[0x8000..0x8200], &image[..]);
    }

    #[test]
    fn test_transport_failure_stops_session() {
        let mut flash = DummyFlash::new_default().fail_on(opcodes::RST);
        let jobs = [ProgramJob::new("a.bin", 0, vec![0; 16])];
        let report = run_session(&mut flash, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert_eq!(
            report.fatal,
            Some(Error::Transport(TransportError::TransferFailed))
        );
        assert_eq!(flash.line(DEFAULT_RESET_LINE), LineLevel::Released);
    }
}
