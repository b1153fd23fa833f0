//! The default command: keep the keypad connected and drive its modes.

use anyhow::{Context, Result};
use console::style;
use inkkeys::{CancelToken, Device, Scheduler, SerialConnector, Supervisor, Target};
use log::info;

use crate::config::Config;
use crate::inspect::ProcfsInspector;
use crate::modes::build_entries;

/// Install a Ctrl+C handler that sets the returned token.
fn setup_interrupt_handler() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();

    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("Failed to install the Ctrl+C handler")?;

    Ok(cancel)
}

/// Run command implementation.
pub(crate) fn cmd_run(config: &Config, target: Target) -> Result<()> {
    let entries = build_entries(config)?;
    let inspector = ProcfsInspector::new(config.window_command.clone());
    let mut scheduler = Scheduler::new(entries, Box::new(inspector));

    match &target {
        Target::Port(name) => info!("Using serial port {name}"),
        Target::Usb { vid, pid } => info!("Looking for the keypad at VID:{vid:04X} PID:{pid:04X}"),
    }
    eprintln!("{}", style("Press Ctrl+C to quit").dim());

    let cancel = setup_interrupt_handler()?;
    let connector = SerialConnector::new(target).with_config(super::serial_config(config));
    let mut device = Device::new();
    Supervisor::new(connector).run(&mut device, &mut scheduler, &cancel);

    Ok(())
}
