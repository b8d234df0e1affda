//! Error types for tgbprog-core
//!
//! A single closed error enum is used throughout the crate. Every variant
//! carries the structured facts of the failure (attempt counts, status bytes,
//! addresses) so callers can branch on the kind and tests can assert on the
//! fields; the human-readable text is produced by `Display`.

use core::fmt;

use crate::chip::JedecId;

/// Failure reported by a transport backend
///
/// Backends log their native error before mapping it to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The link to the programmer is gone (unplugged, closed)
    Disconnected,
    /// A transfer was started but did not complete
    TransferFailed,
    /// Fewer bytes came back than were requested
    ShortRead {
        /// Bytes requested
        expected: usize,
        /// Bytes received
        got: usize,
    },
    /// Driving an auxiliary output line failed
    LineControlFailed,
    /// The backend does not accept this command or line
    Rejected,
}

/// Why a program job was refused before the session started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFault {
    /// The job extends past the end of the device
    BeyondCapacity {
        /// First byte after the job
        end: u64,
        /// Device size in bytes
        capacity: u32,
    },
    /// The job overlaps an earlier job
    Overlaps {
        /// Index of the earlier job
        other: usize,
    },
    /// The job starts inside a page and runs past its end
    ///
    /// PAGE_PROGRAM wraps at the page boundary, so the tail would land at
    /// the start of the page.
    CrossesPage {
        /// Requested offset
        offset: u32,
        /// Job length
        len: usize,
    },
}

/// Core error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// BUSY stayed set for every poll
    BusyTimeout {
        /// Number of status reads performed
        attempts: u32,
    },
    /// WRITE_ENABLE or WRITE_DISABLE did not change the latch
    IllegalLatchState {
        /// The WEL value the command should have produced
        expected_wel: bool,
        /// Status register read after the command
        status: u8,
    },
    /// The device answered READ_ID with an unexpected identity
    IdentityMismatch {
        /// Identity the session was configured for
        expected: JedecId,
        /// Identity actually read
        found: JedecId,
    },
    /// Read-back differs from the programmed data
    VerificationMismatch {
        /// Address of the first differing byte
        addr: u32,
        /// Byte that was programmed there
        expected: u8,
        /// Byte read back
        found: u8,
        /// Total number of differing bytes in the job
        mismatched: usize,
    },
    /// The transport failed
    Transport(TransportError),
    /// The range cannot be expressed with 3-byte addressing
    AddressOutOfRange {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: usize,
    },
    /// A program job failed validation
    InvalidJob {
        /// Index of the job in the session
        index: usize,
        /// What is wrong with it
        reason: JobFault,
    },
}

impl Error {
    /// Returns true if this error must abort the rest of the session
    ///
    /// Verification mismatches are recorded per job and the session moves
    /// on; everything else leaves the device in an unknown state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::VerificationMismatch { .. })
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "programmer disconnected"),
            Self::TransferFailed => write!(f, "SPI transfer failed"),
            Self::ShortRead { expected, got } => {
                write!(f, "short read: expected {} bytes, got {}", expected, got)
            }
            Self::LineControlFailed => write!(f, "failed to drive output line"),
            Self::Rejected => write!(f, "request rejected by programmer"),
        }
    }
}

impl fmt::Display for JobFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeyondCapacity { end, capacity } => write!(
                f,
                "ends at 0x{:06X}, past the end of the device (0x{:06X} bytes)",
                end, capacity
            ),
            Self::Overlaps { other } => write!(f, "overlaps image #{}", other),
            Self::CrossesPage { offset, len } => write!(
                f,
                "{} bytes at unaligned offset 0x{:06X} cross a page boundary",
                len, offset
            ),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusyTimeout { attempts } => {
                write!(f, "busy status timed out after {} polls", attempts)
            }
            Self::IllegalLatchState {
                expected_wel,
                status,
            } => write!(
                f,
                "illegal status register 0x{:02X} (WEL={}, expected {})",
                status,
                (status >> 1) & 1,
                *expected_wel as u8
            ),
            Self::IdentityMismatch { expected, found } => write!(
                f,
                "invalid JEDEC ID ({}), expected ({})",
                found, expected
            ),
            Self::VerificationMismatch {
                addr,
                expected,
                found,
                mismatched,
            } => write!(
                f,
                "verification failed: {} byte(s) differ, first at 0x{:06X}: expected 0x{:02X}, got 0x{:02X}",
                mismatched, addr, expected, found
            ),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::AddressOutOfRange { addr, len } => write!(
                f,
                "range 0x{:06X}+{} is outside the 24-bit address space",
                addr, len
            ),
            Self::InvalidJob { index, reason } => write!(f, "image #{}: {}", index, reason),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
