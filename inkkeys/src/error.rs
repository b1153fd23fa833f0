//! Error types for inkkeys.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for inkkeys operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for inkkeys operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial link.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The device did not finish the info exchange in time.
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The device did not acknowledge a refresh in time.
    #[error("Display refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    /// The device answered but runs the hardware test firmware.
    #[error("Device on {0} runs the hardware test firmware; flash the inkkeys firmware to use it")]
    TestFirmware(String),

    /// A known info key carried a value that does not parse.
    #[error("Malformed info line: {0:?}")]
    MalformedInfo(String),

    /// An operation needed an open connection.
    #[error("Not connected to a device")]
    NotConnected,

    /// No serial port matched the requested device.
    #[error("Device not found")]
    DeviceNotFound,

    /// A display region does not exist in the layout.
    #[error("Invalid display region: {0}")]
    InvalidRegion(String),

    /// A key token cannot be used for this operation.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A macro event does not follow the event grammar.
    #[error("Invalid macro event: {0:?}")]
    InvalidEvent(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fault raised by mode code while connected.
    #[error("Mode error: {0}")]
    Mode(String),
}

impl Error {
    /// Whether this error came from the serial link itself.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io(_) | Self::NotConnected => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}
