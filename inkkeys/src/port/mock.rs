//! In-memory port for tests.
//!
//! Clones share one state, so a test can keep a handle after boxing the port
//! into a [`Device`](crate::Device) and inspect what was written.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::Port;

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<u8>,
    repeat: Vec<u8>,
    written: Vec<u8>,
    closed: bool,
    broken: bool,
}

impl MockState {
    /// Top up from the repeating input once the scripted input ran out.
    fn refill(&mut self) {
        if self.inbound.is_empty() {
            self.inbound.extend(self.repeat.iter().copied());
        }
    }
}

/// A port that replays scripted input and records everything written.
#[derive(Debug, Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    /// A port with nothing to read.
    pub fn new() -> Self {
        Self::default()
    }

    /// A port with `input` waiting to be read.
    pub fn with_input(input: &[u8]) -> Self {
        let port = Self::new();
        port.push_input(input);
        port
    }

    /// Queue more inbound bytes.
    pub fn push_input(&self, input: &[u8]) {
        self.state
            .lock()
            .inbound
            .extend(input.iter().copied());
    }

    /// Offer `input` again every time the queued input runs out.
    pub fn repeat_input(&self, input: &[u8]) {
        self.state.lock().repeat = input.to_vec();
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state
            .lock()
            .written
            .clone()
    }

    /// Everything written so far, lossily decoded.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    /// Everything written since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(
            &mut self
                .state
                .lock()
                .written,
        )
    }

    /// Whether [`Port::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .closed
    }

    /// Make every following operation fail like an unplugged device.
    pub fn unplug(&self) {
        self.state
            .lock()
            .broken = true;
    }

    fn check(state: &MockState) -> std::io::Result<()> {
        if state.broken || state.closed {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))
        } else {
            Ok(())
        }
    }
}

impl Port for MockPort {
    fn name(&self) -> &str {
        "mock"
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let mut state = self.state.lock();
        Self::check(&state).map_err(Error::Io)?;
        state.refill();
        Ok(state.inbound.len())
    }

    fn close(&mut self) -> Result<()> {
        self.state
            .lock()
            .closed = true;
        Ok(())
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.refill();
        if state.inbound.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
