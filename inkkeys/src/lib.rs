//! # inkkeys
//!
//! Host-side driver for the inkkeys macro keypad: nine switches, a jog dial,
//! a strip of RGB LEDs and an e-ink label display, attached over USB serial.
//!
//! This crate provides:
//!
//! - The line protocol: commands, key tokens, macro events and the info
//!   handshake
//! - Bitmap transfer to the display with replay after each refresh
//! - LED colors with a hold-then-fade animation
//! - Key callbacks dispatched from the inbound stream
//! - A 30 fps scheduler that switches between application modes and a
//!   supervisor that keeps the keypad connected
//!
//! ## Features
//!
//! - `native` (default): serial ports via the `serialport` crate
//! - `serde`: serialization support for data types
//! - `testing`: the in-memory `port::mock::MockPort` for downstream tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use inkkeys::{Device, KeyCode, MacroEvent, Rgb};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = inkkeys::NativePort::open_simple("/dev/ttyACM0", 115200)?;
//!     let mut device = Device::new();
//!     let caps = device.connect(Box::new(port))?;
//!     println!("{} LEDs, {}x{} display", caps.led_count, caps.display_width, caps.display_height);
//!
//!     // Volume up on switch 2, handled by the firmware.
//!     device.assign_key(KeyCode::Press(2), &[MacroEvent::consumer(0xE9)])?;
//!     device.register_callback(KeyCode::Press(2), |device| {
//!         device.set_leds(&[Rgb::new(0, 0x80, 0xFF)])
//!     });
//!
//!     loop {
//!         device.fade_leds()?;
//!         device.poll()?;
//!         std::thread::sleep(std::time::Duration::from_millis(33));
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitmap;
pub mod callback;
pub mod discovery;
pub mod display;
pub mod error;
pub mod led;
pub mod port;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod supervisor;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
#[cfg(feature = "native")]
pub use supervisor::SerialConnector;
pub use {
    bitmap::Bitmap,
    callback::CallbackTable,
    discovery::{DEFAULT_PID, DEFAULT_VID, detect_ports, find_device_ports, format_port_list},
    display::{BANNER_HEIGHT, ImagePatch, Layout, Rect, Region, ReplayBuffer},
    error::{Error, Result},
    led::{LedAnimator, Rgb},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{
        Command, DeviceCapabilities, InfoLine, KeyCode, KeyToken, LineTransport, MacroEvent,
        RefreshKind,
    },
    scheduler::{ContextProvider, Matcher, Mode, ModeEntry, PollInterval, Scheduler},
    session::Device,
    supervisor::{CancelToken, Connector, Supervisor, Target},
};
