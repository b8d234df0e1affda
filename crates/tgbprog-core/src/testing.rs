//! Scripted transport for unit tests
//!
//! `ScriptedMaster` answers status reads from a queue, returns a fixed
//! JEDEC ID, serves reads from a sparse memory image and records every
//! exchange so tests can assert on the exact wire traffic.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::error::{Result, TransportError};
use crate::programmer::{LineLevel, OutputControl, SpiMaster};
use crate::spi::{opcodes, SpiCommand};

/// One recorded chip-select cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub sent: Vec<u8>,
    pub read_len: usize,
}

impl Exchange {
    pub fn new(sent: &[u8], read_len: usize) -> Self {
        Self {
            sent: sent.to_vec(),
            read_len,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.sent[0]
    }

    pub fn address(&self) -> u32 {
        ((self.sent[1] as u32) << 16) | ((self.sent[2] as u32) << 8) | self.sent[3] as u32
    }

    pub fn payload(&self) -> &[u8] {
        &self.sent[4..]
    }
}

/// Something observable on the fake programmer, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Spi(u8),
    Line(u8, LineLevel),
}

#[derive(Default)]
pub struct ScriptedMaster {
    status: VecDeque<u8>,
    idle_status: u8,
    id: [u8; 3],
    memory: BTreeMap<u32, u8>,
    fail_opcode: Option<u8>,
    wel: bool,
    ignore_wren: bool,
    log: Vec<Exchange>,
    events: Vec<Event>,
    delays: Vec<u32>,
}

impl ScriptedMaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue status register values
    ///
    /// Once drained, reads return `idle_status` with WEL reflecting the last
    /// WRITE_ENABLE / WRITE_DISABLE / mutating command.
    pub fn with_status<I: IntoIterator<Item = u8>>(mut self, values: I) -> Self {
        self.status.extend(values);
        self
    }

    pub fn stuck_busy(mut self) -> Self {
        self.idle_status = opcodes::SR1_WIP;
        self
    }

    pub fn idle_status(mut self, value: u8) -> Self {
        self.idle_status = value;
        self
    }

    pub fn with_id(mut self, id: [u8; 3]) -> Self {
        self.id = id;
        self
    }

    pub fn with_memory(mut self, base: u32, bytes: &[u8]) -> Self {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory.insert(base + i as u32, b);
        }
        self
    }

    /// WRITE_ENABLE is accepted on the bus but never sets WEL
    pub fn ignore_write_enable(mut self) -> Self {
        self.ignore_wren = true;
        self
    }

    pub fn fail_on(mut self, opcode: u8) -> Self {
        self.fail_opcode = Some(opcode);
        self
    }

    pub fn push_status(&mut self, value: u8) {
        self.status.push_back(value);
    }

    pub fn log(&self) -> &[Exchange] {
        &self.log
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Every exchange except status reads
    pub fn commands(&self) -> Vec<&Exchange> {
        self.log
            .iter()
            .filter(|e| e.opcode() != opcodes::RDSR)
            .collect()
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.commands().iter().map(|e| e.opcode()).collect()
    }

    pub fn status_reads(&self) -> usize {
        self.log
            .iter()
            .filter(|e| e.opcode() == opcodes::RDSR)
            .count()
    }

    pub fn delays(&self) -> &[u32] {
        &self.delays
    }
}

impl SpiMaster for ScriptedMaster {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.log.push(Exchange {
            sent: cmd.to_bytes(),
            read_len: cmd.read_buf.len(),
        });
        self.events.push(Event::Spi(cmd.opcode));

        if self.fail_opcode == Some(cmd.opcode) {
            return Err(TransportError::TransferFailed.into());
        }

        match cmd.opcode {
            opcodes::RDSR => {
                let latched = if self.wel { opcodes::SR1_WEL } else { 0 };
                cmd.read_buf[0] = self
                    .status
                    .pop_front()
                    .unwrap_or(self.idle_status | latched);
            }
            opcodes::WREN => self.wel = !self.ignore_wren,
            opcodes::WRDI | opcodes::PP | opcodes::CE_60 => self.wel = false,
            opcodes::RDID => cmd.read_buf.copy_from_slice(&self.id),
            opcodes::READ => {
                let base = cmd.address.unwrap_or(0);
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = *self.memory.get(&(base + i as u32)).unwrap_or(&0xFF);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delays.push(us);
    }
}

impl OutputControl for ScriptedMaster {
    fn set_output(&mut self, line: u8, level: LineLevel) -> Result<()> {
        self.events.push(Event::Line(line, level));
        Ok(())
    }
}
