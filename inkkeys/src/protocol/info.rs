//! Info handshake: the capability report the keypad sends after `I`.
//!
//! ```text
//! host    -> I
//! device  <- (boot chatter, ignored)
//! device  <- Inkkeys
//! device  <- TEST 0
//! device  <- N_LED 9
//! device  <- DISP_W 128
//! device  <- DISP_H 296
//! device  <- ROT_CIRCLE_STEPS 30
//! device  <- Done
//! ```

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::command::Command;
use crate::protocol::transport::LineTransport;

/// First line of the info report.
pub const INFO_HEADER: &str = "Inkkeys";

/// Last line of the info report.
pub const INFO_TERMINATOR: &str = "Done";

/// Pause between polls while waiting for response lines.
pub const RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the keypad reported about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceCapabilities {
    /// Number of addressable LEDs.
    pub led_count: usize,
    /// Display width in pixels.
    pub display_width: u32,
    /// Display height in pixels.
    pub display_height: u32,
    /// Jog dial steps per full turn.
    pub rotation_steps: u32,
    /// The device runs the hardware test firmware.
    pub test_firmware: bool,
}

/// One line of the info report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoLine {
    /// `Inkkeys`
    Header,
    /// `Done`
    Terminator,
    /// `TEST <flag>`
    TestFirmware(bool),
    /// `N_LED <n>`
    LedCount(usize),
    /// `DISP_W <n>`
    DisplayWidth(u32),
    /// `DISP_H <n>`
    DisplayHeight(u32),
    /// `ROT_CIRCLE_STEPS <n>`
    RotationSteps(u32),
    /// Anything else.
    Unknown(String),
}

impl InfoLine {
    /// Parse one line.
    ///
    /// Unknown keys are not an error; a known key whose value does not parse
    /// is [`Error::MalformedInfo`].
    pub fn parse(line: &str) -> Result<Self> {
        if line == INFO_HEADER {
            return Ok(Self::Header);
        }
        if line == INFO_TERMINATOR {
            return Ok(Self::Terminator);
        }

        let Some((key, value)) = line.split_once(' ') else {
            return Ok(Self::Unknown(line.to_string()));
        };

        let number = |value: &str| {
            value
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::MalformedInfo(line.to_string()))
        };

        Ok(match key {
            "TEST" => match value.chars().next() {
                Some(flag) => Self::TestFirmware(flag != '0'),
                None => return Err(Error::MalformedInfo(line.to_string())),
            },
            "N_LED" => Self::LedCount(number(value)? as usize),
            "DISP_W" => Self::DisplayWidth(number(value)?),
            "DISP_H" => Self::DisplayHeight(number(value)?),
            "ROT_CIRCLE_STEPS" => Self::RotationSteps(number(value)?),
            _ => Self::Unknown(line.to_string()),
        })
    }
}

impl DeviceCapabilities {
    fn apply(&mut self, line: InfoLine) {
        match line {
            InfoLine::TestFirmware(flag) => self.test_firmware = flag,
            InfoLine::LedCount(n) => self.led_count = n,
            InfoLine::DisplayWidth(n) => self.display_width = n,
            InfoLine::DisplayHeight(n) => self.display_height = n,
            InfoLine::RotationSteps(n) => self.rotation_steps = n,
            InfoLine::Unknown(line) => debug!("Skipping info line: {line}"),
            InfoLine::Header | InfoLine::Terminator => {},
        }
    }
}

/// Wait for the next line, failing once `timeout` has passed since `start`.
///
/// The deadline is checked before every line, so a stream of unrelated
/// lines cannot keep the caller waiting.
pub(crate) fn next_line(
    transport: &mut LineTransport,
    start: Instant,
    timeout: Duration,
    on_timeout: fn(Duration) -> Error,
) -> Result<String> {
    loop {
        if start.elapsed() > timeout {
            return Err(on_timeout(timeout));
        }
        if let Some(line) = transport.read_line()? {
            return Ok(line);
        }
        thread::sleep(RESPONSE_POLL_INTERVAL);
    }
}

/// Run the info exchange on an exclusively held transport.
pub fn request_info(transport: &mut LineTransport, timeout: Duration) -> Result<DeviceCapabilities> {
    info!("Requesting device info...");
    let start = Instant::now();
    transport.write(&Command::Info.encode())?;

    loop {
        let line = next_line(transport, start, timeout, Error::HandshakeTimeout)?;
        if line == INFO_HEADER {
            break;
        }
        debug!("Skipping: {line}");
    }
    debug!("Header found, waiting for info lines");

    let mut caps = DeviceCapabilities::default();
    loop {
        let line = next_line(transport, start, timeout, Error::HandshakeTimeout)?;
        match InfoLine::parse(&line)? {
            InfoLine::Terminator => break,
            parsed => caps.apply(parsed),
        }
    }

    info!(
        "Device info: test firmware {}, {} LEDs, display {}x{}, {} jog steps",
        caps.test_firmware,
        caps.led_count,
        caps.display_width,
        caps.display_height,
        caps.rotation_steps
    );
    Ok(caps)
}
