//! Key tokens reported by the keypad and used in key assignments.
//!
//! ```text
//! 1p .. 9p    switch pressed   (switch 1 is the jog dial push button)
//! 1r .. 9r    switch released
//! R+ / R-     jog dial stepped clockwise / counter-clockwise
//! R<n>        absolute jog position, n = -?[0-9]+
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Number of switches on the keypad, including the jog push button.
pub const SWITCH_COUNT: u8 = 9;

/// A key edge that can be assigned a macro or a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Switch `n` (1..=9) went down.
    Press(u8),
    /// Switch `n` (1..=9) went up.
    Release(u8),
    /// Jog dial stepped clockwise.
    JogCw,
    /// Jog dial stepped counter-clockwise.
    JogCcw,
}

impl KeyCode {
    /// Jog dial push button pressed (same wire token as switch 1).
    pub const JOG_PRESS: Self = Self::Press(1);
    /// Jog dial push button released (same wire token as switch 1).
    pub const JOG_RELEASE: Self = Self::Release(1);

    /// Whether the switch number, if any, exists on the keypad.
    pub fn is_valid(self) -> bool {
        match self {
            Self::Press(n) | Self::Release(n) => (1..=SWITCH_COUNT).contains(&n),
            Self::JogCw | Self::JogCcw => true,
        }
    }

    /// Every assignable key code: all presses, all releases, then both jog steps.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=SWITCH_COUNT)
            .map(Self::Press)
            .chain((1..=SWITCH_COUNT).map(Self::Release))
            .chain([Self::JogCw, Self::JogCcw])
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Press(n) => write!(f, "{n}p"),
            Self::Release(n) => write!(f, "{n}r"),
            Self::JogCw => f.write_str("R+"),
            Self::JogCcw => f.write_str("R-"),
        }
    }
}

impl FromStr for KeyCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match KeyToken::parse(s) {
            Some(KeyToken::Key(code)) => Ok(code),
            _ => Err(Error::InvalidKey(s.to_string())),
        }
    }
}

/// One inbound key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    /// A switch edge or a jog step.
    Key(KeyCode),
    /// Absolute jog position, reported instead of steps by some firmware builds.
    JogPosition(i32),
}

impl KeyToken {
    /// Classify an inbound line.
    ///
    /// Returns `None` for anything that is not a key event; those lines are
    /// protocol responses.
    pub fn parse(line: &str) -> Option<Self> {
        let bytes = line.as_bytes();

        if let [digit @ b'1'..=b'9', edge] = bytes {
            let n = digit - b'0';
            return match edge {
                b'p' => Some(Self::Key(KeyCode::Press(n))),
                b'r' => Some(Self::Key(KeyCode::Release(n))),
                _ => None,
            };
        }

        let rest = line.strip_prefix('R')?;
        match rest {
            "+" => Some(Self::Key(KeyCode::JogCw)),
            "-" => Some(Self::Key(KeyCode::JogCcw)),
            _ => {
                let digits = rest
                    .strip_prefix('-')
                    .unwrap_or(rest);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                rest.parse()
                    .ok()
                    .map(Self::JogPosition)
            },
        }
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(code) => code.fmt(f),
            Self::JogPosition(value) => write!(f, "R{value}"),
        }
    }
}
