//! SPI command structure

use alloc::vec::Vec;

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
///
/// On the wire a command is the opcode, the address (if any, big-endian),
/// then `write_data`; after that `read_buf.len()` bytes are clocked in.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Data to write after opcode/address
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Length of the opcode plus address phase
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize
    }

    /// Write the opcode and address into the start of `buf`
    ///
    /// `buf` must hold at least `header_len()` bytes.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..]);
        }
    }

    /// All bytes shifted out for this command: header followed by write data
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len = self.header_len();
        let mut out = alloc::vec![0u8; header_len + self.write_data.len()];
        self.encode_header(&mut out);
        out[header_len..].copy_from_slice(self.write_data);
        out
    }

    /// Calculate the total number of bytes to transfer (for timing/buffer allocation)
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_page_program_bytes() {
        let data = [0xDE, 0xAD];
        let cmd = SpiCommand::write_3b(opcodes::PP, 0x001100, &data);
        assert_eq!(cmd.to_bytes(), [0x02, 0x00, 0x11, 0x00, 0xDE, 0xAD]);
        assert_eq!(cmd.total_bytes(), 6);
    }

    #[test]
    fn test_read_data_header() {
        let mut buf = [0u8; 256];
        let cmd = SpiCommand::read_3b(opcodes::READ, 0x0A0B0C, &mut buf);
        assert_eq!(cmd.to_bytes(), [0x03, 0x0A, 0x0B, 0x0C]);
        assert!(cmd.has_read());
        assert_eq!(cmd.total_bytes(), 4 + 256);
    }

    #[test]
    fn test_simple_command() {
        let cmd = SpiCommand::simple(opcodes::WREN);
        assert_eq!(cmd.to_bytes(), [0x06]);
        assert!(!cmd.has_address());
        assert!(!cmd.has_write());
    }
}
