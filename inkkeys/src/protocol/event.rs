//! Macro events carried by the Assign command.
//!
//! The firmware replays an assigned sequence locally when the key edge
//! happens, so the host does not have to be fast for plain shortcuts.
//!
//! ```text
//! k<code>[p|r]       keyboard key (tap, press or release)
//! c<code>[p|r]       consumer control (media keys)
//! m<code>[p|r]       mouse button
//! m<x|y|w>i<delta>   mouse axis increment
//! d<ms>              delay
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// HID interface an event is sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidDevice {
    /// Consumer control page.
    Consumer,
    /// Keyboard page.
    Keyboard,
    /// Mouse buttons.
    Mouse,
}

impl HidDevice {
    fn code(self) -> char {
        match self {
            Self::Consumer => 'c',
            Self::Keyboard => 'k',
            Self::Mouse => 'm',
        }
    }
}

/// What happens to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAction {
    /// Press and release.
    #[default]
    Tap,
    /// Press and hold.
    Press,
    /// Release a held key.
    Release,
}

/// Mouse axis for increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAxis {
    /// Horizontal movement.
    X,
    /// Vertical movement.
    Y,
    /// Scroll wheel.
    Wheel,
}

impl MouseAxis {
    fn code(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Wheel => 'w',
        }
    }
}

/// One step of an assigned macro sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroEvent {
    /// A key on one of the HID interfaces.
    Key {
        /// Interface.
        device: HidDevice,
        /// HID usage code.
        code: u16,
        /// Tap, press or release.
        action: KeyAction,
    },
    /// Relative mouse movement or scrolling.
    MouseMove {
        /// Axis.
        axis: MouseAxis,
        /// Signed increment.
        delta: i32,
    },
    /// Pause the sequence.
    Delay(u32),
}

impl MacroEvent {
    /// Keyboard tap.
    pub fn key(code: u16) -> Self {
        Self::Key {
            device: HidDevice::Keyboard,
            code,
            action: KeyAction::Tap,
        }
    }

    /// Keyboard press.
    pub fn key_press(code: u16) -> Self {
        Self::Key {
            device: HidDevice::Keyboard,
            code,
            action: KeyAction::Press,
        }
    }

    /// Keyboard release.
    pub fn key_release(code: u16) -> Self {
        Self::Key {
            device: HidDevice::Keyboard,
            code,
            action: KeyAction::Release,
        }
    }

    /// Consumer control tap (volume, media keys).
    pub fn consumer(code: u16) -> Self {
        Self::Key {
            device: HidDevice::Consumer,
            code,
            action: KeyAction::Tap,
        }
    }
}

impl fmt::Display for MacroEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key {
                device,
                code,
                action,
            } => {
                write!(f, "{}{code}", device.code())?;
                match action {
                    KeyAction::Tap => Ok(()),
                    KeyAction::Press => f.write_str("p"),
                    KeyAction::Release => f.write_str("r"),
                }
            },
            Self::MouseMove { axis, delta } => write!(f, "m{}i{delta}", axis.code()),
            Self::Delay(ms) => write!(f, "d{ms}"),
        }
    }
}

impl FromStr for MacroEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidEvent(s.to_string());

        let mut chars = s.chars();
        let prefix = chars
            .next()
            .ok_or_else(invalid)?;
        let body = chars.as_str();

        let device = match prefix {
            'd' => {
                return body
                    .parse()
                    .map(Self::Delay)
                    .map_err(|_| invalid());
            },
            'm' => {
                let axis = match body.chars().next() {
                    Some('x') => Some(MouseAxis::X),
                    Some('y') => Some(MouseAxis::Y),
                    Some('w') => Some(MouseAxis::Wheel),
                    _ => None,
                };
                if let Some(axis) = axis {
                    let delta = body[1..]
                        .strip_prefix('i')
                        .ok_or_else(invalid)?
                        .parse()
                        .map_err(|_| invalid())?;
                    return Ok(Self::MouseMove { axis, delta });
                }
                HidDevice::Mouse
            },
            'k' => HidDevice::Keyboard,
            'c' => HidDevice::Consumer,
            _ => return Err(invalid()),
        };

        let (digits, action) = if let Some(digits) = body.strip_suffix('p') {
            (digits, KeyAction::Press)
        } else if let Some(digits) = body.strip_suffix('r') {
            (digits, KeyAction::Release)
        } else {
            (body, KeyAction::Tap)
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let code = digits
            .parse()
            .map_err(|_| invalid())?;

        Ok(Self::Key {
            device,
            code,
            action,
        })
    }
}
