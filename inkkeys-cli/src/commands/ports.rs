//! Port listing command implementation.

use anyhow::Result;
use console::style;
use inkkeys::{PortInfo, detect_ports, format_port_list};

/// JSON document for `list-ports --json`.
fn ports_json(ports: &[PortInfo], vid: u16, pid: u16) -> serde_json::Value {
    let ports: Vec<serde_json::Value> = ports
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "inkkeys": p.matches(vid, pid),
                "vid": p.vid,
                "pid": p.pid,
                "manufacturer": p.manufacturer,
                "product": p.product,
                "serial": p.serial_number,
            })
        })
        .collect();
    serde_json::json!({
        "ok": true,
        "data": {
            "ports": ports,
        }
    })
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool, vid: u16, pid: u16) -> Result<()> {
    let detected = detect_ports();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ports_json(&detected, vid, pid))?
        );
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for (port, line) in detected
        .iter()
        .zip(format_port_list(&detected, vid, pid))
    {
        let line = if port.matches(vid, pid) {
            style(line).cyan().bold()
        } else {
            style(line)
        };
        eprintln!("  {} {line}", style("•").green());
    }

    if let Some(found) = detected
        .iter()
        .find(|p| p.matches(vid, pid))
    {
        eprintln!(
            "\n{} Keypad found on {}",
            style("→").green().bold(),
            style(&found.name).cyan().bold()
        );
    }

    Ok(())
}
