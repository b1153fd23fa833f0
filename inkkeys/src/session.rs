//! One connection to a keypad.
//!
//! [`Device`] owns the line transport, the capabilities reported during the
//! handshake, the display replay buffer, the LED fade state and the key
//! callbacks. The transport sits behind a mutex: request/response exchanges
//! hold it for their whole duration, while [`Device::poll`] only takes it to
//! read a single line.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::bitmap::Bitmap;
use crate::callback::CallbackTable;
use crate::display::{Layout, Region, ReplayBuffer};
use crate::error::{Error, Result};
use crate::led::{LedAnimator, Rgb};
use crate::port::Port;
use crate::protocol::info::next_line;
use crate::protocol::{
    ACK, Command, DeviceCapabilities, KeyCode, KeyToken, LineTransport, MacroEvent, RefreshKind,
    request_info,
};

/// Time allowed for the info exchange after connecting.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Time allowed for a complete refresh exchange.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// A keypad session.
#[derive(Debug, Default)]
pub struct Device {
    link: Mutex<Option<LineTransport>>,
    caps: Option<DeviceCapabilities>,
    layout: Option<Layout>,
    replay: ReplayBuffer,
    leds: LedAnimator,
    callbacks: CallbackTable,
}

impl Device {
    /// Create a disconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take over `port` and run the handshake.
    pub fn connect(&mut self, port: Box<dyn Port>) -> Result<DeviceCapabilities> {
        self.connect_with_timeout(port, HANDSHAKE_TIMEOUT)
    }

    /// Like [`connect`](Self::connect) with a custom handshake timeout.
    ///
    /// The port is closed again if the handshake fails or the device runs
    /// the hardware test firmware.
    pub fn connect_with_timeout(
        &mut self,
        port: Box<dyn Port>,
        timeout: Duration,
    ) -> Result<DeviceCapabilities> {
        self.disconnect();

        let name = port.name().to_string();
        info!("Connecting to {name}");
        let mut transport = LineTransport::new(port);

        let caps = match request_info(&mut transport, timeout) {
            Ok(caps) => caps,
            Err(e) => {
                close_quietly(&mut transport);
                return Err(e);
            },
        };

        if caps.test_firmware {
            close_quietly(&mut transport);
            return Err(Error::TestFirmware(name));
        }

        self.layout = Some(Layout::new(&caps));
        self.caps = Some(caps);
        *self.link.lock() = Some(transport);
        info!("Connected to {name}");
        Ok(caps)
    }

    /// Close the port and forget everything tied to the connection.
    ///
    /// Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.link.lock().take() {
            info!("Disconnecting from {}", transport.name());
            close_quietly(&mut transport);
        }
        self.caps = None;
        self.layout = None;
        self.replay.clear();
        self.leds.clear();
        self.callbacks.clear_all();
    }

    /// Whether a port is attached.
    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Name of the attached port.
    pub fn port_name(&self) -> Option<String> {
        self.link
            .lock()
            .as_ref()
            .map(|t| t.name().to_string())
    }

    /// Capabilities reported by the last handshake.
    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.caps
    }

    /// Region table for the connected panel.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Patches waiting for the next refresh.
    pub fn pending_patches(&self) -> usize {
        self.replay.len()
    }

    /// Read at most one inbound line and dispatch it if it is a key event.
    ///
    /// Returns the token that was read. Response lines arriving outside an
    /// exchange are dropped.
    pub fn poll(&mut self) -> Result<Option<KeyToken>> {
        let line = {
            let mut link = self.link.lock();
            let transport = link
                .as_mut()
                .ok_or(Error::NotConnected)?;
            transport.read_line()?
        };

        let Some(line) = line else {
            return Ok(None);
        };
        let Some(token) = KeyToken::parse(&line) else {
            debug!("Ignoring line: {line:?}");
            return Ok(None);
        };

        debug!("Key event {token}");
        if let Some(handler) = self.callbacks.handler(token) {
            handler.invoke(self)?;
        }
        Ok(Some(token))
    }

    /// Encode and send one command.
    pub fn send(&self, command: &Command<'_>) -> Result<()> {
        let mut link = self.link.lock();
        let transport = link
            .as_mut()
            .ok_or(Error::NotConnected)?;
        transport.write(&command.encode())
    }

    /// Bind a macro sequence to a key edge on the device.
    ///
    /// An empty sequence clears the binding.
    pub fn assign_key(&self, key: KeyCode, events: &[MacroEvent]) -> Result<()> {
        if !key.is_valid() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        self.send(&Command::Assign { key, events })
    }

    /// Draw `bitmap` at `(x, y)` and remember it for the next refresh.
    pub fn send_image(&mut self, x: u32, y: u32, bitmap: &Bitmap) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.replay.record(x, y, bitmap.clone());
        self.send(&Command::Display { x, y, bitmap })
    }

    /// Draw `bitmap` into a layout region, rescaling it to fit.
    pub fn send_region(&mut self, region: Region, bitmap: &Bitmap) -> Result<()> {
        let rect = self
            .layout
            .as_ref()
            .ok_or(Error::NotConnected)?
            .rect(region)?;

        if bitmap.size() == rect.size() {
            self.send_image(rect.x, rect.y, bitmap)
        } else {
            debug!(
                "Rescaling {region} image from {:?} to {:?}",
                bitmap.size(),
                rect.size()
            );
            let scaled = bitmap.resized(rect.width, rect.height);
            self.send_image(rect.x, rect.y, &scaled)
        }
    }

    /// Refresh the panel and resend everything drawn since the last refresh.
    pub fn refresh(&mut self, full: bool) -> Result<()> {
        self.refresh_with_timeout(full, REFRESH_TIMEOUT)
    }

    /// Like [`refresh`](Self::refresh) with a custom timeout covering the
    /// whole exchange.
    pub fn refresh_with_timeout(&mut self, full: bool, timeout: Duration) -> Result<()> {
        let kind = if full {
            RefreshKind::Full
        } else {
            RefreshKind::Partial
        };

        let mut link = self.link.lock();
        let transport = link
            .as_mut()
            .ok_or(Error::NotConnected)?;
        let start = Instant::now();

        transport.write(&Command::Refresh(kind).encode())?;
        wait_for_ack(transport, start, timeout)?;

        let patches = self.replay.take();
        debug!("Replaying {} patches", patches.len());
        for patch in &patches {
            let replay = Command::Display {
                x: patch.x,
                y: patch.y,
                bitmap: &patch.bitmap,
            };
            transport.write(&replay.encode())?;
        }

        transport.write(&Command::Refresh(RefreshKind::Off).encode())?;
        wait_for_ack(transport, start, timeout)
    }

    /// Set every LED and restart the hold-then-fade timer.
    ///
    /// Colors are padded with black or truncated to the reported LED count.
    pub fn set_leds(&mut self, colors: &[Rgb]) -> Result<()> {
        let mut colors = colors.to_vec();
        if let Some(led_count) = self.caps.map(|c| c.led_count) {
            if colors.len() != led_count {
                warn!("Got {} LED colors for {led_count} LEDs, adjusting", colors.len());
                colors.resize(led_count, Rgb::BLACK);
            }
        }

        self.send(&Command::Led(&colors))?;
        self.leds.set(colors, Instant::now());
        Ok(())
    }

    /// Advance the LED fade, sending a frame when one is due.
    pub fn fade_leds(&mut self) -> Result<()> {
        self.fade_leds_at(Instant::now())
    }

    /// [`fade_leds`](Self::fade_leds) at an explicit instant.
    pub fn fade_leds_at(&mut self, now: Instant) -> Result<()> {
        let led_count = self.caps.map_or(0, |c| c.led_count);
        match self.leds.step(now, led_count) {
            Some(frame) => self.send(&Command::Led(&frame)),
            None => Ok(()),
        }
    }

    /// Whether LEDs are being held or faded.
    pub fn leds_active(&self) -> bool {
        self.leds.is_active()
    }

    /// Run `callback` whenever `key` is reported.
    pub fn register_callback<F>(&mut self, key: KeyCode, callback: F)
    where
        F: Fn(&mut Self) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.register(key, callback);
    }

    /// Run `callback` with the value of every absolute jog position report.
    pub fn register_jog_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut Self, i32) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.register_jog(callback);
    }

    /// Remove the callback for `key`.
    pub fn clear_callback(&mut self, key: KeyCode) {
        self.callbacks.clear(key);
    }

    /// Remove the jog-position callback.
    pub fn clear_jog_callback(&mut self) {
        self.callbacks.clear_jog();
    }

    /// Remove every callback.
    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear_all();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(mut transport) = self.link.get_mut().take() {
            close_quietly(&mut transport);
        }
    }
}

fn wait_for_ack(transport: &mut LineTransport, start: Instant, timeout: Duration) -> Result<()> {
    loop {
        let line = next_line(transport, start, timeout, Error::RefreshTimeout)?;
        if line == ACK {
            return Ok(());
        }
        debug!("Dropping {line:?} while waiting for {ACK:?}");
    }
}

fn close_quietly(transport: &mut LineTransport) {
    if let Err(e) = transport.close() {
        warn!("Failed to close {}: {e}", transport.name());
    }
}
