//! Host-side reactions to key events.
//!
//! Callbacks receive the [`Device`] they were dispatched from, so they can
//! send commands or swap callbacks (including themselves) while running.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{KeyCode, KeyToken};
use crate::session::Device;

/// Callback for a switch edge or a jog step.
pub type KeyCallback = Arc<dyn Fn(&mut Device) -> Result<()> + Send + Sync>;

/// Callback for absolute jog positions.
pub type JogCallback = Arc<dyn Fn(&mut Device, i32) -> Result<()> + Send + Sync>;

/// A callback resolved for one inbound token, detached from the table.
pub enum Handler {
    /// Key edge or jog step.
    Key(KeyCallback),
    /// Absolute jog position with its value.
    Jog(JogCallback, i32),
}

impl Handler {
    /// Run the callback.
    pub fn invoke(self, device: &mut Device) -> Result<()> {
        match self {
            Self::Key(callback) => callback(device),
            Self::Jog(callback, value) => callback(device, value),
        }
    }
}

/// At most one callback per key code plus one jog-position callback.
#[derive(Default)]
pub struct CallbackTable {
    keys: HashMap<KeyCode, KeyCallback>,
    jog: Option<JogCallback>,
}

impl CallbackTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback for `key`, replacing any previous one.
    pub fn register<F>(&mut self, key: KeyCode, callback: F)
    where
        F: Fn(&mut Device) -> Result<()> + Send + Sync + 'static,
    {
        self.keys.insert(key, Arc::new(callback));
    }

    /// Set the jog-position callback, replacing any previous one.
    pub fn register_jog<F>(&mut self, callback: F)
    where
        F: Fn(&mut Device, i32) -> Result<()> + Send + Sync + 'static,
    {
        self.jog = Some(Arc::new(callback));
    }

    /// Remove the callback for `key`.
    pub fn clear(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    /// Remove the jog-position callback.
    pub fn clear_jog(&mut self) {
        self.jog = None;
    }

    /// Remove every callback.
    pub fn clear_all(&mut self) {
        self.keys.clear();
        self.jog = None;
    }

    /// Whether `key` has a callback.
    pub fn contains(&self, key: KeyCode) -> bool {
        self.keys.contains_key(&key)
    }

    /// Number of registered callbacks, the jog callback included.
    pub fn len(&self) -> usize {
        self.keys.len() + usize::from(self.jog.is_some())
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the callback for `token`, if any.
    ///
    /// The returned handler holds its own reference, so the table may be
    /// changed while it runs.
    pub fn handler(&self, token: KeyToken) -> Option<Handler> {
        match token {
            KeyToken::Key(code) => self
                .keys
                .get(&code)
                .cloned()
                .map(Handler::Key),
            KeyToken::JogPosition(value) => self
                .jog
                .clone()
                .map(|callback| Handler::Jog(callback, value)),
        }
    }
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .keys
            .keys()
            .map(ToString::to_string)
            .collect();
        keys.sort();
        f.debug_struct("CallbackTable")
            .field("keys", &keys)
            .field("jog", &self.jog.is_some())
            .finish()
    }
}
