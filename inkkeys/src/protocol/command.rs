//! Outbound commands.
//!
//! Every command is one text line starting with a single-letter code. The
//! Display command is followed by a binary bitmap payload.
//!
//! ```text
//! A <key>[ <event>]*        assign a macro sequence to a key edge
//! D <x> <y> <w> <h>\n<bits> draw a bitmap (ceil(w*h/8) bytes)
//! L <rrggbb> ...            set every LED
//! R p|f|o                   refresh partial / full / power the panel off
//! I                         request the info report
//! ```

use std::fmt::Write as _;

use crate::bitmap::Bitmap;
use crate::led::Rgb;
use crate::protocol::event::MacroEvent;
use crate::protocol::key::KeyCode;

/// Single-letter command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// `A`
    Assign,
    /// `D`
    Display,
    /// `L`
    Led,
    /// `R`
    Refresh,
    /// `I`
    Info,
}

impl CommandCode {
    /// Wire letter.
    pub fn letter(self) -> char {
        match self {
            Self::Assign => 'A',
            Self::Display => 'D',
            Self::Led => 'L',
            Self::Refresh => 'R',
            Self::Info => 'I',
        }
    }
}

/// Display refresh variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Fast update, may leave ghosting.
    Partial,
    /// Full update with the panel flashing.
    Full,
    /// Power the panel down after drawing.
    Off,
}

impl RefreshKind {
    /// Wire letter.
    pub fn letter(self) -> char {
        match self {
            Self::Partial => 'p',
            Self::Full => 'f',
            Self::Off => 'o',
        }
    }
}

/// A command ready to be encoded.
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Bind a macro sequence to a key edge. An empty sequence clears it.
    Assign {
        /// Key edge.
        key: KeyCode,
        /// Events replayed by the firmware.
        events: &'a [MacroEvent],
    },
    /// Draw a bitmap with its top-left corner at `(x, y)`.
    Display {
        /// Left edge.
        x: u32,
        /// Top edge.
        y: u32,
        /// Image.
        bitmap: &'a Bitmap,
    },
    /// Set all LED colors at once.
    Led(&'a [Rgb]),
    /// Refresh the panel.
    Refresh(RefreshKind),
    /// Request the info report.
    Info,
}

impl Command<'_> {
    /// Command code of this command.
    pub fn code(&self) -> CommandCode {
        match self {
            Self::Assign { .. } => CommandCode::Assign,
            Self::Display { .. } => CommandCode::Display,
            Self::Led(_) => CommandCode::Led,
            Self::Refresh(_) => CommandCode::Refresh,
            Self::Info => CommandCode::Info,
        }
    }

    /// Wire bytes, including the line terminator and any binary payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = String::new();
        line.push(self.code().letter());

        match self {
            Self::Assign { key, events } => {
                let _ = write!(line, " {key}");
                for event in *events {
                    let _ = write!(line, " {event}");
                }
            },
            Self::Display { x, y, bitmap } => {
                let (w, h) = bitmap.size();
                let _ = write!(line, " {x} {y} {w} {h}");
            },
            Self::Led(colors) => {
                for color in *colors {
                    let _ = write!(line, " {color}");
                }
            },
            Self::Refresh(kind) => {
                line.push(' ');
                line.push(kind.letter());
            },
            Self::Info => {},
        }
        line.push('\n');

        let mut bytes = line.into_bytes();
        if let Self::Display { bitmap, .. } = self {
            bytes.extend(bitmap.pack_rotated());
        }
        bytes
    }
}
