//! Connection retry loop.
//!
//! ```text
//!            connect ok
//! Searching ------------> Connected (scheduler runs)
//!     ^                        |
//!     |   error, cancel, exit  |
//!     +---- wait 3 s <---------+
//! ```
//!
//! Errors while connected are logged and the device is dropped; only a
//! cancellation while searching or waiting ends [`Supervisor::run`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::Result;
use crate::port::Port;
use crate::scheduler::Scheduler;
use crate::session::Device;

/// Pause between connection attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Granularity of cancellable waits.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Shared cancellation flag, set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a handled request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the wait was cut short by a cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}

/// Where the supervisor looks for the keypad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A fixed port name.
    Port(String),
    /// Any port reporting this USB VID/PID.
    Usb {
        /// Vendor ID.
        vid: u16,
        /// Product ID.
        pid: u16,
    },
}

/// Finds and opens candidate ports.
pub trait Connector {
    /// Port names to try in this pass, in order.
    fn candidates(&mut self) -> Result<Vec<String>>;

    /// Open one port.
    fn open(&mut self, name: &str) -> Result<Box<dyn Port>>;
}

/// [`Connector`] for real serial ports.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct SerialConnector {
    target: Target,
    config: crate::port::SerialConfig,
}

#[cfg(feature = "native")]
impl SerialConnector {
    /// Connector for `target` at the keypad's default line settings.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            config: crate::port::SerialConfig::default(),
        }
    }

    /// Override baud rate and timeout. The port name is ignored.
    pub fn with_config(mut self, config: crate::port::SerialConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(feature = "native")]
impl Connector for SerialConnector {
    fn candidates(&mut self) -> Result<Vec<String>> {
        Ok(match &self.target {
            Target::Port(name) => vec![name.clone()],
            Target::Usb { vid, pid } => {
                let names: Vec<String> = crate::discovery::find_device_ports(*vid, *pid)
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                if names.is_empty() {
                    debug!("No serial port with VID:{vid:04X} PID:{pid:04X}");
                }
                names
            },
        })
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Port>> {
        let config = crate::port::SerialConfig {
            port_name: name.to_string(),
            ..self.config.clone()
        };
        Ok(Box::new(crate::port::NativePort::open(&config)?))
    }
}

/// Outcome of trying one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// The port did not lead to a working session.
    Failed,
    /// A session ran and ended.
    Worked,
    /// A session ran and the operator interrupted it.
    Interrupted,
}

/// Keeps a [`Device`] connected and runs the scheduler on it.
#[derive(Debug)]
pub struct Supervisor<C> {
    connector: C,
    retry_delay: Duration,
}

impl<C: Connector> Supervisor<C> {
    /// Create a supervisor using `connector` to find ports.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Change the pause between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Search, connect and run until cancelled while not connected.
    ///
    /// A cancellation during a session only ends that session.
    pub fn run(&mut self, device: &mut Device, scheduler: &mut Scheduler, cancel: &CancelToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.connector.candidates() {
                Ok(names) => {
                    for name in names {
                        if cancel.is_cancelled() {
                            break;
                        }
                        match self.try_port(&name, device, scheduler, cancel) {
                            Attempt::Failed => continue,
                            Attempt::Worked => break,
                            Attempt::Interrupted => {
                                cancel.reset();
                                warn!("Disconnected from device. Hit Ctrl+C again to quit before reconnect.");
                                break;
                            },
                        }
                    }
                },
                Err(e) => warn!("Port search failed: {e}"),
            }

            if cancel.is_cancelled() {
                break;
            }
            info!("Retrying in {} seconds...", self.retry_delay.as_secs_f32());
            if cancel.sleep(self.retry_delay) {
                break;
            }
        }
        info!("Ok, bye.");
    }

    fn try_port(
        &mut self,
        name: &str,
        device: &mut Device,
        scheduler: &mut Scheduler,
        cancel: &CancelToken,
    ) -> Attempt {
        let port = match self.connector.open(name) {
            Ok(port) => port,
            Err(e) => {
                error!("Failed to open {name}: {e}");
                return Attempt::Failed;
            },
        };

        if let Err(e) = device.connect(port) {
            error!("Failed to connect to {name}: {e}");
            debug!("{e:?}");
            return Attempt::Failed;
        }

        let result = scheduler.run(device, cancel);
        device.disconnect();

        match result {
            Ok(()) if cancel.is_cancelled() => Attempt::Interrupted,
            Ok(()) => Attempt::Worked,
            Err(e) => {
                if e.is_transport() {
                    error!("Lost device on {name}: {e}");
                } else {
                    error!("Session on {name} failed: {e}");
                }
                debug!("{e:?}");
                Attempt::Worked
            },
        }
    }
}
