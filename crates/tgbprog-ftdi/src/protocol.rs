//! FTDI MPSSE protocol constants and command encoding
//!
//! Based on the FTDI MPSSE application notes (AN_108, AN_135).

use crate::error::{FtdiError, Result};

// ============================================================================
// USB VID/PID constants
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;

/// FT2232H product ID (dual channel)
pub const FTDI_FT2232H_PID: u16 = 0x6010;

/// FT4232H product ID (quad channel)
pub const FTDI_FT4232H_PID: u16 = 0x6011;

/// FT232H product ID (single channel)
pub const FTDI_FT232H_PID: u16 = 0x6014;

/// FT4233H product ID (quad channel)
pub const FTDI_FT4233H_PID: u16 = 0x6041;

// ============================================================================
// MPSSE Commands
// ============================================================================

/// Write bytes on negative clock edge (SPI mode 0/2)
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Read bytes on positive clock edge (SPI mode 0/2)
pub const MPSSE_DO_READ: u8 = 0x20;

/// Write on negative clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Set data bits low byte
pub const SET_BITS_LOW: u8 = 0x80;

/// Disable loopback mode
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Send immediate (flush buffers)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz clock)
pub const DIS_DIV_5: u8 = 0x8A;

/// Largest byte count one MPSSE read or write command can carry
pub const MPSSE_MAX_TRANSFER: usize = 65536;

/// Default clock divisor (6 MHz at 60 MHz base clock)
pub const DEFAULT_DIVISOR: u16 = 10;

// ============================================================================
// Pin assignments (low byte)
//
// TCK/SK is bit 0.  (clock)
// TDI/DO is bit 1.  (data out)
// TDO/DI is bit 2.  (data in)
// TMS/CS is bit 3.  (chip select)
// GPIOL0 is bit 4.
// GPIOL1 is bit 5.
// GPIOL2 is bit 6.
// GPIOL3 is bit 7.
// ============================================================================

/// Bit position for SK (clock)
pub const PIN_SK: u8 = 0;

/// Bit position for DO (data out / MOSI)
pub const PIN_DO: u8 = 1;

/// Bit position for CS (chip select)
pub const PIN_CS: u8 = 3;

/// Bit position for GPIOL0
pub const PIN_GPIOL0: u8 = 4;

/// Bit position for GPIOL3
pub const PIN_GPIOL3: u8 = 7;

/// Default CS bits (CS high)
pub const DEFAULT_CS_BITS: u8 = 1 << PIN_CS;

/// Default pin direction (SK, DO, CS as outputs)
pub const DEFAULT_PINDIR: u8 = (1 << PIN_SK) | (1 << PIN_DO) | (1 << PIN_CS);

// ============================================================================
// Supported device types
// ============================================================================

/// Supported FTDI device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiDeviceType {
    /// FT2232H (dual channel, 60 MHz)
    #[default]
    Ft2232H,
    /// FT4232H (quad channel, 60 MHz)
    Ft4232H,
    /// FT232H (single channel, 60 MHz)
    Ft232H,
    /// FT4233H (quad channel, 60 MHz)
    Ft4233H,
}

impl FtdiDeviceType {
    /// Every supported type
    pub const ALL: [FtdiDeviceType; 4] = [
        FtdiDeviceType::Ft2232H,
        FtdiDeviceType::Ft4232H,
        FtdiDeviceType::Ft232H,
        FtdiDeviceType::Ft4233H,
    ];

    /// Get the vendor ID for this device type
    pub fn vendor_id(&self) -> u16 {
        FTDI_VID
    }

    /// Get the product ID for this device type
    pub fn product_id(&self) -> u16 {
        match self {
            FtdiDeviceType::Ft2232H => FTDI_FT2232H_PID,
            FtdiDeviceType::Ft4232H => FTDI_FT4232H_PID,
            FtdiDeviceType::Ft232H => FTDI_FT232H_PID,
            FtdiDeviceType::Ft4233H => FTDI_FT4233H_PID,
        }
    }

    /// Get the number of channels for this device type
    pub fn channel_count(&self) -> u8 {
        match self {
            FtdiDeviceType::Ft232H => 1,
            FtdiDeviceType::Ft2232H => 2,
            FtdiDeviceType::Ft4232H | FtdiDeviceType::Ft4233H => 4,
        }
    }

    /// Parse device type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "2232h" | "ft2232h" => Some(FtdiDeviceType::Ft2232H),
            "4232h" | "ft4232h" => Some(FtdiDeviceType::Ft4232H),
            "232h" | "ft232h" => Some(FtdiDeviceType::Ft232H),
            "4233h" | "ft4233h" => Some(FtdiDeviceType::Ft4233H),
            _ => None,
        }
    }

    /// Get the name of this device type
    pub fn name(&self) -> &'static str {
        match self {
            FtdiDeviceType::Ft2232H => "FT2232H",
            FtdiDeviceType::Ft4232H => "FT4232H",
            FtdiDeviceType::Ft232H => "FT232H",
            FtdiDeviceType::Ft4233H => "FT4233H",
        }
    }
}

/// FTDI interface/channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiInterface {
    /// Channel A (default)
    #[default]
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl FtdiInterface {
    /// Parse interface from character
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(FtdiInterface::A),
            'B' => Some(FtdiInterface::B),
            'C' => Some(FtdiInterface::C),
            'D' => Some(FtdiInterface::D),
            _ => None,
        }
    }

    /// Get the interface index (0-3)
    pub fn index(&self) -> u8 {
        match self {
            FtdiInterface::A => 0,
            FtdiInterface::B => 1,
            FtdiInterface::C => 2,
            FtdiInterface::D => 3,
        }
    }

    /// Get the channel letter
    pub fn letter(&self) -> char {
        match self {
            FtdiInterface::A => 'A',
            FtdiInterface::B => 'B',
            FtdiInterface::C => 'C',
            FtdiInterface::D => 'D',
        }
    }
}

// ============================================================================
// Command encoding
// ============================================================================

/// State of the low byte of the MPSSE port
///
/// `cs_bits` are driven high while CS is idle, `aux_bits` hold the level of
/// the GPIOL outputs, `pindir` marks outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    /// Chip select bits (high when idle)
    pub cs_bits: u8,
    /// Auxiliary output levels
    pub aux_bits: u8,
    /// Pin direction (1 = output)
    pub pindir: u8,
}

impl Default for PinState {
    fn default() -> Self {
        Self {
            cs_bits: DEFAULT_CS_BITS,
            aux_bits: 0,
            pindir: DEFAULT_PINDIR,
        }
    }
}

impl PinState {
    /// SET_BITS_LOW with CS idle (high)
    pub fn idle(&self) -> [u8; 3] {
        [SET_BITS_LOW, self.cs_bits | self.aux_bits, self.pindir]
    }

    /// SET_BITS_LOW with CS asserted (low)
    pub fn selected(&self) -> [u8; 3] {
        [SET_BITS_LOW, self.aux_bits, self.pindir]
    }

    /// Update the state of one GPIOL pin (ADBUS bit `bit`)
    ///
    /// Only GPIOL0-3 may be driven, and never a pin already used as CS.
    pub fn set_line(&mut self, bit: u8, level: tgbprog_core::programmer::LineLevel) -> Result<()> {
        use tgbprog_core::programmer::LineLevel;

        if !(PIN_GPIOL0..=PIN_GPIOL3).contains(&bit) {
            return Err(FtdiError::LineUnavailable(bit));
        }
        let mask = 1u8 << bit;
        if self.cs_bits & mask != 0 {
            return Err(FtdiError::LineUnavailable(bit));
        }

        match level {
            LineLevel::Low => {
                self.aux_bits &= !mask;
                self.pindir |= mask;
            }
            LineLevel::High => {
                self.aux_bits |= mask;
                self.pindir |= mask;
            }
            LineLevel::Released => {
                self.aux_bits &= !mask;
                self.pindir &= !mask;
            }
        }
        Ok(())
    }
}

/// MPSSE setup sequence: 60 MHz base clock, divisor, loopback off, pins
pub fn init_sequence(divisor: u16, pins: &PinState) -> Vec<u8> {
    // The MPSSE divides by 2 * (value + 1)
    let value = divisor / 2 - 1;
    let mut buf = vec![
        DIS_DIV_5,
        TCK_DIVISOR,
        (value & 0xFF) as u8,
        (value >> 8) as u8,
        LOOPBACK_END,
    ];
    buf.extend_from_slice(&pins.idle());
    buf
}

/// Build one chip-select cycle: select, write, read, deselect, flush
pub fn transfer_sequence(pins: &PinState, write_data: &[u8], read_len: usize) -> Result<Vec<u8>> {
    if write_data.len() > MPSSE_MAX_TRANSFER {
        return Err(FtdiError::TooLong(write_data.len()));
    }
    if read_len > MPSSE_MAX_TRANSFER {
        return Err(FtdiError::TooLong(read_len));
    }

    let mut buf = Vec::with_capacity(write_data.len() + 16);
    buf.extend_from_slice(&pins.selected());

    if !write_data.is_empty() {
        let n = write_data.len() - 1;
        buf.push(MPSSE_DO_WRITE | MPSSE_WRITE_NEG);
        buf.push((n & 0xFF) as u8);
        buf.push(((n >> 8) & 0xFF) as u8);
        buf.extend_from_slice(write_data);
    }

    if read_len > 0 {
        let n = read_len - 1;
        buf.push(MPSSE_DO_READ);
        buf.push((n & 0xFF) as u8);
        buf.push(((n >> 8) & 0xFF) as u8);
    }

    buf.extend_from_slice(&pins.idle());
    buf.push(SEND_IMMEDIATE);
    Ok(buf)
}
