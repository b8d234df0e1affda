//! Error types for FTDI programmer

use thiserror::Error;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur during FTDI operations
#[derive(Debug, Error)]
pub enum FtdiError {
    /// Failed to open device
    #[error("Failed to open {device} channel {channel}: {reason}")]
    OpenFailed {
        device: &'static str,
        channel: char,
        reason: String,
    },

    /// Failed to configure device
    #[error("Failed to configure device ({step}): {reason}")]
    ConfigFailed { step: &'static str, reason: String },

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// The adapter stopped answering mid-response
    #[error("Timed out waiting for data: got {got} of {expected} bytes")]
    ReadTimeout { expected: usize, got: usize },

    /// A single MPSSE command cannot carry this many bytes
    #[error("Transfer of {0} bytes exceeds the 64 KiB MPSSE limit")]
    TooLong(usize),

    /// The ADBUS bit cannot be used as an auxiliary output
    #[error("ADBUS{0} is not a free GPIOL pin")]
    LineUnavailable(u8),

    /// Invalid device type
    #[error("Invalid device type: {0}")]
    InvalidDeviceType(String),

    /// Invalid channel/port specification
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
