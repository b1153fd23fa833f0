//! Serial port discovery.
//!
//! The keypad enumerates as a USB CDC serial port. It is found by the
//! VID/PID pair of its microcontroller board.

#[cfg(feature = "native")]
use log::{debug, trace};

#[cfg(feature = "native")]
use crate::port::{NativePortEnumerator, PortEnumerator};
use crate::port::PortInfo;

/// USB vendor ID of the keypad's board.
pub const DEFAULT_VID: u16 = 0x1b4f;

/// USB product ID of the keypad's board.
pub const DEFAULT_PID: u16 = 0x9206;

/// Enumerate all serial ports with their USB metadata.
///
/// Enumeration failures are logged and yield an empty list.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<PortInfo> {
    match NativePortEnumerator::list_ports() {
        Ok(ports) => {
            for port in &ports {
                if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                    trace!("Found USB port: {} (VID: {vid:04X}, PID: {pid:04X})", port.name);
                }
            }
            ports
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Enumerate all serial ports (no native backend, always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<PortInfo> {
    Vec::new()
}

/// Ports reporting the given VID/PID, in enumeration order.
pub fn find_device_ports(vid: u16, pid: u16) -> Vec<PortInfo> {
    filter_device_ports(detect_ports(), vid, pid)
}

/// Keep the ports reporting the given VID/PID.
pub fn filter_device_ports(ports: Vec<PortInfo>, vid: u16, pid: u16) -> Vec<PortInfo> {
    ports
        .into_iter()
        .filter(|p| p.matches(vid, pid))
        .collect()
}

/// Render ports for display, marking the ones matching `vid`/`pid`.
pub fn format_port_list(ports: &[PortInfo], vid: u16, pid: u16) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let usb_info = match (port.vid, port.pid) {
                (Some(v), Some(p)) => format!(" [VID:{v:04X} PID:{p:04X}]"),
                _ => String::new(),
            };
            let product_info = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();
            let marker = if port.matches(vid, pid) {
                " (inkkeys)"
            } else {
                ""
            };
            format!("{}{usb_info}{product_info}{marker}", port.name)
        })
        .collect()
}
