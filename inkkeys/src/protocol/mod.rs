//! Serial line protocol.
//!
//! The keypad speaks newline-terminated ASCII in both directions. The host
//! sends single-letter commands; the device answers with response lines and
//! reports key edges as short tokens on the same stream.

pub mod command;
pub mod event;
pub mod info;
pub mod key;
pub mod transport;

pub use command::{Command, CommandCode, RefreshKind};
pub use event::{HidDevice, KeyAction, MacroEvent, MouseAxis};
pub use info::{DeviceCapabilities, InfoLine, request_info};
pub use key::{KeyCode, KeyToken, SWITCH_COUNT};
pub use transport::LineTransport;

/// Acknowledgement line sent by the device after a refresh.
pub const ACK: &str = "ok";
