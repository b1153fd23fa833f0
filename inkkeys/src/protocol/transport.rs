//! Newline framing on top of a [`Port`].

use std::fmt;
use std::io::Read;

use log::{trace, warn};

use crate::error::Result;
use crate::port::Port;

/// Upper bound for one non-blocking top-up read.
const READ_CHUNK: usize = 4096;

/// Longest unterminated inbound line kept; older bytes are dropped.
pub const MAX_LINE_LEN: usize = 1024;

/// Line-oriented view of the serial link.
///
/// Outbound bytes go straight to the port. Inbound bytes accumulate in a
/// buffer and are handed out one `\n`-terminated line at a time.
pub struct LineTransport {
    port: Box<dyn Port>,
    buffer: Vec<u8>,
}

impl fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineTransport")
            .field("port", &self.name())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl LineTransport {
    /// Wrap an opened port.
    pub fn new(port: Box<dyn Port>) -> Self {
        Self {
            port,
            buffer: Vec::new(),
        }
    }

    /// Name of the underlying port.
    pub fn name(&self) -> &str {
        self.port.name()
    }

    /// Send raw bytes immediately, without adding any framing.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("TX {} bytes", bytes.len());
        self.port.write_all_bytes(bytes)
    }

    /// Return the next complete line, if one is buffered.
    ///
    /// Never blocks: only bytes the port already holds are read. Carriage
    /// returns are removed and the line is decoded lossily.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        self.fill()?;

        let Some(end) = self
            .buffer
            .iter()
            .position(|&b| b == b'\n')
        else {
            return Ok(None);
        };

        let mut raw: Vec<u8> = self
            .buffer
            .drain(..=end)
            .collect();
        raw.pop();
        raw.retain(|&b| b != b'\r');

        let line = String::from_utf8_lossy(&raw).into_owned();
        trace!("RX {line:?}");
        Ok(Some(line))
    }

    /// Close the underlying port.
    pub fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.port.close()
    }

    fn fill(&mut self) -> Result<()> {
        let pending = self.port.bytes_to_read()?;
        if pending == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; pending.min(READ_CHUNK)];
        let n = self.port.read(&mut chunk)?;
        self.buffer.extend_from_slice(&chunk[..n]);
        self.trim_partial_line();
        Ok(())
    }

    fn trim_partial_line(&mut self) {
        let tail_start = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let tail = self.buffer.len() - tail_start;
        if tail > MAX_LINE_LEN {
            let excess = tail - MAX_LINE_LEN;
            warn!("Dropping {excess} bytes of unterminated input");
            self.buffer.drain(tail_start..tail_start + excess);
        }
    }
}
