//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod info;
pub(crate) mod ports;
pub(crate) mod run;

use inkkeys::{DEFAULT_PID, DEFAULT_VID, SerialConfig, Target};

use crate::Cli;
use crate::config::Config;

/// Where to look for the keypad: flags first, then config, then the default VID/PID.
pub(crate) fn resolve_target(cli: &Cli, config: &Config) -> Target {
    if let Some(port) = cli
        .port
        .clone()
        .or_else(|| config.port.connection.serial.clone())
    {
        return Target::Port(port);
    }

    let (vid, pid) = usb_ids(cli, config);
    Target::Usb { vid, pid }
}

/// VID/PID used for discovery and for marking ports in listings.
pub(crate) fn usb_ids(cli: &Cli, config: &Config) -> (u16, u16) {
    (
        cli.vid
            .or(config.device.vid)
            .unwrap_or(DEFAULT_VID),
        cli.pid
            .or(config.device.pid)
            .unwrap_or(DEFAULT_PID),
    )
}

/// Line settings for opened ports.
pub(crate) fn serial_config(config: &Config) -> SerialConfig {
    let mut serial = SerialConfig::default();
    if let Some(baud) = config.port.connection.baud {
        serial.baud_rate = baud;
    }
    serial
}
