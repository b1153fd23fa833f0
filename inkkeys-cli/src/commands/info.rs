//! Device info command implementation.

use anyhow::{Context, Result};
use console::style;
use inkkeys::{Connector, Device, DeviceCapabilities, Error, Port};
use log::debug;

/// Connect to the first candidate port and read its capabilities.
pub(crate) fn query<C: Connector>(connector: &mut C) -> Result<(String, DeviceCapabilities)> {
    let candidates = connector
        .candidates()
        .context("Failed to search for the keypad")?;
    let name = candidates
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound)?;

    debug!("Querying {name}");
    let port: Box<dyn Port> = connector
        .open(&name)
        .with_context(|| format!("Failed to open {name}"))?;

    let mut device = Device::new();
    let caps = device
        .connect(port)
        .with_context(|| format!("No inkkeys handshake on {name}"))?;
    device.disconnect();

    Ok((name, caps))
}

/// JSON document for `info --json`.
fn info_json(port: &str, caps: &DeviceCapabilities) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "ok": true,
        "data": {
            "port": port,
            "capabilities": serde_json::to_value(caps)?,
        }
    }))
}

/// Info command implementation.
pub(crate) fn cmd_info<C: Connector>(connector: &mut C, json: bool) -> Result<()> {
    let (port, caps) = query(connector)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info_json(&port, &caps)?)?
        );
        return Ok(());
    }

    println!("{}", style(format!("inkkeys on {port}")).bold().underlined());
    println!("  LEDs:          {}", style(caps.led_count).cyan());
    println!(
        "  Display:       {}x{}",
        style(caps.display_width).cyan(),
        style(caps.display_height).cyan()
    );
    println!("  Jog steps:     {}", style(caps.rotation_steps).cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{INFO_FIXTURE, MockPort};

    struct OnePort(Option<MockPort>);

    impl Connector for OnePort {
        fn candidates(&mut self) -> inkkeys::Result<Vec<String>> {
            Ok(self
                .0
                .iter()
                .map(|_| "/dev/ttyACM0".to_string())
                .collect())
        }

        fn open(&mut self, _name: &str) -> inkkeys::Result<Box<dyn Port>> {
            let port = self.0.clone().ok_or(Error::DeviceNotFound)?;
            Ok(Box::new(port))
        }
    }

    #[test]
    fn test_query_reads_capabilities() {
        let port = MockPort::with_input(INFO_FIXTURE);
        let mut connector = OnePort(Some(port.clone()));

        let (name, caps) = query(&mut connector).unwrap();
        assert_eq!(name, "/dev/ttyACM0");
        assert_eq!(caps.led_count, 9);
        assert_eq!((caps.display_width, caps.display_height), (212, 104));
        assert_eq!(caps.rotation_steps, 24);
        assert!(port.written_text().starts_with("I\n"));
    }

    #[test]
    fn test_query_without_device() {
        let err = query(&mut OnePort(None)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DeviceNotFound)
        ));
    }

    #[test]
    fn test_query_rejects_test_firmware() {
        let port = MockPort::with_input(b"Inkkeys\nTEST 1\nDone\n");
        let err = query(&mut OnePort(Some(port))).unwrap_err();
        assert!(format!("{err:#}").contains("No inkkeys handshake"));
    }

    #[test]
    fn test_info_json_shape() {
        let caps = DeviceCapabilities {
            led_count: 9,
            display_width: 128,
            display_height: 296,
            rotation_steps: 24,
            test_firmware: false,
        };
        let doc = info_json("/dev/ttyACM0", &caps).unwrap();
        assert_eq!(doc["data"]["port"], "/dev/ttyACM0");
        assert_eq!(doc["data"]["capabilities"]["led_count"], 9);
        assert_eq!(doc["data"]["capabilities"]["display_height"], 296);
    }
}
