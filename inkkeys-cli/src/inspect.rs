//! Desktop context for mode selection: running processes and the focused window.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use inkkeys::ContextProvider;
use log::{debug, trace};

/// Reads process names from procfs and asks a shell command for the window title.
#[derive(Debug, Clone)]
pub struct ProcfsInspector {
    proc_root: PathBuf,
    window_command: Option<String>,
}

impl ProcfsInspector {
    /// Inspector over `/proc`.
    pub fn new(window_command: Option<String>) -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            window_command,
        }
    }

    /// Read process entries from `root` instead of `/proc`.
    #[cfg(test)]
    fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }
}

impl ContextProvider for ProcfsInspector {
    fn process_names(&mut self) -> HashSet<String> {
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            trace!("No process list at {}", self.proc_root.display());
            return HashSet::new();
        };

        entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .parse::<u32>()
                    .is_ok()
            })
            .filter_map(|entry| fs::read_to_string(entry.path().join("comm")).ok())
            .map(|comm| comm.trim_end().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn active_window(&mut self) -> Option<String> {
        let command = self.window_command.as_deref()?;

        let output = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!("Window command failed to start: {e}");
                return None;
            },
        };

        if !output.status.success() {
            debug!("Window command exited with {}", output.status);
            return None;
        }

        let title = String::from_utf8_lossy(&output.stdout)
            .trim()
            .to_string();
        (!title.is_empty()).then_some(title)
    }
}
