//! FTDI MPSSE device implementation
//!
//! This module provides the main `Ftdi` struct that implements SPI
//! communication using FTDI's MPSSE engine and drives one GPIOL pin as the
//! board reset line.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use tgbprog_core::error::{Result as CoreResult, TransportError};
use tgbprog_core::programmer::{execute_with_vec, LineLevel, OutputControl, SpiMaster};
use tgbprog_core::spi::SpiCommand;

use crate::error::{FtdiError, Result};
use crate::protocol::*;

/// Configuration for opening an FTDI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtdiConfig {
    /// Device type (determines VID/PID)
    pub device_type: FtdiDeviceType,
    /// Interface/channel to use (A, B, C, D)
    pub interface: FtdiInterface,
    /// Clock divisor (2-65534, must be even)
    /// SPI clock = 60 MHz / divisor
    pub divisor: u16,
    /// ADBUS bit wired to the board reset (GPIOL0 = bit 4)
    pub reset_bit: u8,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        Self::for_device(FtdiDeviceType::default())
    }
}

impl FtdiConfig {
    /// Create a new config for a specific device type
    pub fn for_device(device_type: FtdiDeviceType) -> Self {
        FtdiConfig {
            device_type,
            interface: FtdiInterface::default(),
            divisor: DEFAULT_DIVISOR,
            reset_bit: PIN_GPIOL0,
        }
    }

    /// Set the interface/channel
    pub fn interface(mut self, interface: FtdiInterface) -> Result<Self> {
        // Validate that the interface is available on this device
        let max_channel = self.device_type.channel_count();
        if interface.index() >= max_channel {
            return Err(FtdiError::InvalidChannel(format!(
                "Channel {} not available on {} (max: {})",
                interface.letter(),
                self.device_type.name(),
                (b'A' + max_channel - 1) as char
            )));
        }
        self.interface = interface;
        Ok(self)
    }

    /// Set the clock divisor
    pub fn divisor(mut self, divisor: u16) -> Result<Self> {
        if divisor < 2 || divisor % 2 != 0 {
            return Err(FtdiError::InvalidParameter(format!(
                "Invalid divisor {}: must be even, between 2 and 65534",
                divisor
            )));
        }
        self.divisor = divisor;
        Ok(self)
    }

    /// Select which GPIOL pin (0-3) drives the board reset
    pub fn reset_gpiol(mut self, pin: u8) -> Result<Self> {
        if pin > 3 {
            return Err(FtdiError::InvalidParameter(format!(
                "Invalid GPIOL pin {}: must be 0-3",
                pin
            )));
        }
        self.reset_bit = PIN_GPIOL0 + pin;
        Ok(self)
    }

    /// Calculate the SPI clock frequency in MHz
    pub fn spi_clock_mhz(&self) -> f64 {
        60.0 / self.divisor as f64
    }
}

/// How long a response may take to arrive before the adapter is considered
/// wedged
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Read exactly `len` bytes, giving up once `timeout` has passed without the
/// full response
fn read_with_deadline<R: Read>(reader: &mut R, len: usize, timeout: Duration) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut total = 0;
    let deadline = Instant::now() + timeout;

    while total < len {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if Instant::now() >= deadline {
                    return Err(FtdiError::ReadTimeout {
                        expected: len,
                        got: total,
                    });
                }
                // No data available, wait a bit
                std::thread::sleep(Duration::from_micros(100));
            }
            Ok(n) => {
                total += n;
            }
            Err(e) => return Err(FtdiError::TransferFailed(e)),
        }
    }

    Ok(buf)
}

/// FTDI MPSSE programmer
///
/// This struct represents a connection to an FTDI device using the MPSSE
/// engine for SPI communication.
pub struct Ftdi {
    /// libftdi device context
    device: Device,
    /// Current low-byte pin state
    pins: PinState,
    /// ADBUS bit of the reset line
    reset_bit: u8,
}

impl Ftdi {
    /// Open an FTDI device with the given configuration
    pub fn open(config: &FtdiConfig) -> Result<Self> {
        log::info!(
            "Opening FTDI {} channel {}",
            config.device_type.name(),
            config.interface.letter()
        );

        let interface = match config.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
            FtdiInterface::C => Interface::C,
            FtdiInterface::D => Interface::D,
        };

        let vid = config.device_type.vendor_id();
        let pid = config.device_type.product_id();
        log::debug!("Looking for FTDI device VID={:04X} PID={:04X}", vid, pid);

        let mut device = find_by_vid_pid(vid, pid)
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed {
                device: config.device_type.name(),
                channel: config.interface.letter(),
                reason: e.to_string(),
            })?;

        device.usb_reset().map_err(|e| FtdiError::ConfigFailed {
            step: "USB reset",
            reason: e.to_string(),
        })?;

        // 2ms latency keeps the many short status polls fast
        device
            .set_latency_timer(2)
            .map_err(|e| FtdiError::ConfigFailed {
                step: "latency timer",
                reason: e.to_string(),
            })?;

        device
            .set_bitmode(0x00, BitMode::Mpsse)
            .map_err(|e| FtdiError::ConfigFailed {
                step: "MPSSE mode",
                reason: e.to_string(),
            })?;

        let mut ftdi = Ftdi {
            device,
            pins: PinState::default(),
            reset_bit: config.reset_bit,
        };

        log::debug!(
            "Initialising MPSSE: divisor {}, pins 0x{:02X}/0x{:02X}",
            config.divisor,
            ftdi.pins.cs_bits,
            ftdi.pins.pindir
        );
        let init = init_sequence(config.divisor, &ftdi.pins);
        ftdi.send(&init)?;

        log::info!(
            "FTDI configured for SPI mode 0 at {:.2} MHz, reset on ADBUS{}",
            config.spi_clock_mhz(),
            config.reset_bit
        );

        Ok(ftdi)
    }

    /// Open the first device matching the default configuration
    pub fn open_first() -> Result<Self> {
        Self::open(&FtdiConfig::default())
    }

    /// ADBUS bit wired to the board reset
    pub fn reset_line(&self) -> u8 {
        self.reset_bit
    }

    /// Send data to the FTDI device
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.device
            .write_all(data)
            .map_err(FtdiError::TransferFailed)?;
        log::trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Receive data from the FTDI device
    fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let buf = read_with_deadline(&mut self.device, len, RECV_TIMEOUT)?;
        log::trace!("Received {} bytes", buf.len());
        Ok(buf)
    }

    /// Perform an SPI transfer
    fn spi_transfer(&mut self, write_data: &[u8], read_len: usize) -> Result<Vec<u8>> {
        let buf = transfer_sequence(&self.pins, write_data, read_len)?;
        self.send(&buf)?;

        if read_len > 0 {
            self.recv(read_len)
        } else {
            Ok(Vec::new())
        }
    }

    /// Release I/O pins (set all as inputs)
    fn release_pins(&mut self) -> Result<()> {
        let buf = [SET_BITS_LOW, 0x00, 0x00];
        self.send(&buf)
    }
}

impl Drop for Ftdi {
    fn drop(&mut self) {
        // Release I/O pins on close
        if let Err(e) = self.release_pins() {
            log::warn!("Failed to release pins on close: {}", e);
        }
    }
}

impl SpiMaster for Ftdi {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        execute_with_vec(cmd, |write_data, read_len| {
            self.spi_transfer(write_data, read_len).map_err(|e| {
                log::error!("FTDI transfer failed: {}", e);
                match e {
                    FtdiError::TooLong(_) => TransportError::Rejected,
                    FtdiError::ReadTimeout { expected, got } => {
                        TransportError::ShortRead { expected, got }
                    }
                    _ => TransportError::TransferFailed,
                }
            })
        })
    }

    fn delay_us(&mut self, us: u32) {
        // The MPSSE doesn't have built-in delay commands for arbitrary times
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

impl OutputControl for Ftdi {
    fn set_output(&mut self, line: u8, level: LineLevel) -> CoreResult<()> {
        let mut pins = self.pins;
        pins.set_line(line, level).map_err(|e| {
            log::error!("{}", e);
            TransportError::Rejected
        })?;

        log::debug!("ADBUS{} -> {:?}", line, level);
        self.send(&pins.idle()).map_err(|e| {
            log::error!("Failed to drive ADBUS{}: {}", line, e);
            TransportError::LineControlFailed
        })?;
        self.pins = pins;
        Ok(())
    }
}

/// Parse programmer options
///
/// Format: "type=<type>,port=<A|B|C|D>,divisor=<N>,reset=gpiol<0-3>"
pub fn parse_options(options: &[(&str, &str)]) -> Result<FtdiConfig> {
    let mut config = FtdiConfig::default();

    // The device type decides which channels exist, so apply it first
    if let Some((_, value)) = options.iter().find(|(k, _)| *k == "type") {
        config.device_type = FtdiDeviceType::parse(value).ok_or_else(|| {
            FtdiError::InvalidDeviceType(format!(
                "Unknown device type '{}'. Valid types: 2232h, 4232h, 232h, 4233h",
                value
            ))
        })?;
    }

    for (key, value) in options {
        match *key {
            "type" => {}
            "port" | "channel" => {
                let mut chars = value.chars();
                let interface = match (chars.next(), chars.next()) {
                    (Some(c), None) => FtdiInterface::from_char(c),
                    _ => None,
                }
                .ok_or_else(|| {
                    FtdiError::InvalidChannel(format!(
                        "Invalid channel '{}': must be A, B, C, or D",
                        value
                    ))
                })?;
                config = config.interface(interface)?;
            }
            "divisor" => {
                let divisor: u16 = value.parse().map_err(|_| {
                    FtdiError::InvalidParameter(format!("Invalid divisor '{}'", value))
                })?;
                config = config.divisor(divisor)?;
            }
            "reset" => {
                let pin = value
                    .to_ascii_lowercase()
                    .strip_prefix("gpiol")
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(|| {
                        FtdiError::InvalidParameter(format!(
                            "Invalid reset pin '{}': must be gpiol0-gpiol3",
                            value
                        ))
                    })?;
                config = config.reset_gpiol(pin)?;
            }
            _ => {
                log::warn!("Unknown FTDI option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out `chunks` one read at a time, then reports no data forever
    struct Trickle {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_read_collects_partial_responses() {
        let mut reader = Trickle {
            chunks: vec![vec![0xEF], vec![], vec![0x40, 0x14]],
        };
        let buf = read_with_deadline(&mut reader, 3, Duration::from_millis(100)).unwrap();
        assert_eq!(buf, [0xEF, 0x40, 0x14]);
    }

    #[test]
    fn test_silent_adapter_times_out() {
        let mut reader = Trickle {
            chunks: vec![vec![0x00; 10]],
        };
        let err = read_with_deadline(&mut reader, 256, Duration::from_millis(5)).unwrap_err();
        assert!(matches!(
            err,
            FtdiError::ReadTimeout {
                expected: 256,
                got: 10
            }
        ));
    }

    #[test]
    fn test_defaults_match_cartridge_board() {
        let config = parse_options(&[]).unwrap();
        assert_eq!(config.device_type, FtdiDeviceType::Ft2232H);
        assert_eq!(config.interface, FtdiInterface::A);
        assert_eq!(config.divisor, 10);
        assert_eq!(config.reset_bit, 4);
        assert!((config.spi_clock_mhz() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_full_options() {
        let config = parse_options(&[
            ("port", "B"),
            ("type", "4232h"),
            ("divisor", "4"),
            ("reset", "GPIOL2"),
        ])
        .unwrap();
        assert_eq!(config.device_type, FtdiDeviceType::Ft4232H);
        assert_eq!(config.interface, FtdiInterface::B);
        assert_eq!(config.divisor, 4);
        assert_eq!(config.reset_bit, 6);
    }

    #[test]
    fn test_channel_must_exist() {
        let err = parse_options(&[("type", "232h"), ("port", "B")]).unwrap_err();
        assert!(matches!(err, FtdiError::InvalidChannel(_)));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(parse_options(&[("divisor", "3")]).is_err());
        assert!(parse_options(&[("reset", "gpiol4")]).is_err());
        assert!(parse_options(&[("reset", "adbus4")]).is_err());
        assert!(parse_options(&[("port", "AB")]).is_err());
        assert!(parse_options(&[("type", "jtagkey")]).is_err());
    }
}
