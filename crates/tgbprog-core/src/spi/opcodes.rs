//! Standard SPI NOR flash opcodes
//!
//! Only the commands the programmer issues are listed. All of them use
//! single I/O and, where an address is present, 3-byte addressing.

use super::AddressWidth;

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status and identification
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read JEDEC ID (manufacturer, device, capacity)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Array access
// ============================================================================

/// Read Data (3-byte address, no dummy cycles)
pub const READ: u8 = 0x03;
/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Chip Erase (entire chip)
pub const CE_60: u8 = 0x60;

// ============================================================================
// Software Reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device
pub const RST: u8 = 0x99;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;

/// Bytes requested by a READ_DATA command
pub const READ_CHUNK: usize = 256;

/// The command set used by the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// READ_STATUS (05h)
    ReadStatus,
    /// WRITE_ENABLE (06h)
    WriteEnable,
    /// WRITE_DISABLE (04h)
    WriteDisable,
    /// READ_ID (9Fh)
    ReadId,
    /// SOFT_RESET_ENABLE (66h)
    SoftResetEnable,
    /// SOFT_RESET (99h)
    SoftReset,
    /// CHIP_ERASE (60h)
    ChipErase,
    /// PAGE_PROGRAM (02h)
    PageProgram,
    /// READ_DATA (03h)
    ReadData,
}

impl Command {
    /// Every command, in table order
    pub const ALL: [Command; 9] = [
        Command::ReadStatus,
        Command::WriteEnable,
        Command::WriteDisable,
        Command::ReadId,
        Command::SoftResetEnable,
        Command::SoftReset,
        Command::ChipErase,
        Command::PageProgram,
        Command::ReadData,
    ];

    /// The opcode byte sent on the wire
    pub const fn opcode(self) -> u8 {
        match self {
            Self::ReadStatus => RDSR,
            Self::WriteEnable => WREN,
            Self::WriteDisable => WRDI,
            Self::ReadId => RDID,
            Self::SoftResetEnable => RSTEN,
            Self::SoftReset => RST,
            Self::ChipErase => CE_60,
            Self::PageProgram => PP,
            Self::ReadData => READ,
        }
    }

    /// Look up a command by opcode
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.opcode() == opcode)
    }

    /// Address phase following the opcode
    pub const fn address_width(self) -> AddressWidth {
        match self {
            Self::PageProgram | Self::ReadData => AddressWidth::ThreeByte,
            _ => AddressWidth::None,
        }
    }

    /// Number of response bytes the command expects
    ///
    /// READ_DATA always requests one full chunk; callers trim the result.
    pub const fn response_len(self) -> usize {
        match self {
            Self::ReadStatus => 1,
            Self::ReadId => 3,
            Self::ReadData => READ_CHUNK,
            _ => 0,
        }
    }

    /// Returns true if the command changes the array and needs WEL set
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::ChipErase | Self::PageProgram)
    }

    /// Mnemonic used in trace output
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadStatus => "READ_STATUS",
            Self::WriteEnable => "WRITE_ENABLE",
            Self::WriteDisable => "WRITE_DISABLE",
            Self::ReadId => "READ_ID",
            Self::SoftResetEnable => "SOFT_RESET_ENABLE",
            Self::SoftReset => "SOFT_RESET",
            Self::ChipErase => "CHIP_ERASE",
            Self::PageProgram => "PAGE_PROGRAM",
            Self::ReadData => "READ_DATA",
        }
    }
}
