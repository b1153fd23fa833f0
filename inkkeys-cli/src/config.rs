//! Configuration file support for inkkeys.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (INKKEYS_*)
//! 3. Local config file (./inkkeys.toml)
//! 4. Global config file (~/.config/inkkeys/config.toml)
//!
//! `--config PATH` replaces both files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Name of the local config file.
pub const LOCAL_CONFIG: &str = "inkkeys.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Fixed serial port (e.g., "/dev/ttyACM0" or "COM3"). Disables discovery.
    pub serial: Option<String>,
    /// Baud rate override.
    pub baud: Option<u32>,
}

/// Port-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// USB identity used for discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB Vendor ID.
    pub vid: Option<u16>,
    /// USB Product ID.
    pub pid: Option<u16>,
}

/// One `[[mode]]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeConfig {
    /// Used in logs when the mode is activated.
    pub name: String,
    /// Active while a process with this name runs.
    pub process: Option<String>,
    /// Active while the focused window's title starts with a match of this regex.
    pub window: Option<String>,
    /// Key token (`"2p"`, `"R+"`, ...) to macro events (`"k30"`, `"c233"`, `"d50"`, ...).
    #[serde(default)]
    pub keys: BTreeMap<String, Vec<String>>,
    /// Hex color (`"#rrggbb"`) flashed on the LED of a pressed switch.
    pub press_color: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Port configuration.
    #[serde(default)]
    pub port: PortConfig,
    /// Discovery configuration.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,
    /// Shell command printing the focused window's title.
    pub window_command: Option<String>,
    /// Modes in priority order.
    #[serde(default, rename = "mode")]
    pub modes: Vec<ModeConfig>,
    /// Files this configuration was read from.
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path)? {
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG))? {
            config.merge(local_config);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::load_from_file(path)?
            .with_context(|| format!("Config file not found: {}", path.display()))
    }

    /// Load one file. A missing file is not an error.
    fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.sources.push(path.to_path_buf());
        Ok(Some(config))
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "inkkeys").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    ///
    /// A file that defines any modes replaces the whole mode list.
    fn merge(&mut self, other: Self) {
        if other.port.connection.serial.is_some() {
            self.port.connection.serial = other.port.connection.serial;
        }
        if other.port.connection.baud.is_some() {
            self.port.connection.baud = other.port.connection.baud;
        }
        if other.device.vid.is_some() {
            self.device.vid = other.device.vid;
        }
        if other.device.pid.is_some() {
            self.device.pid = other.device.pid;
        }
        if other.debug {
            self.debug = true;
        }
        if other.window_command.is_some() {
            self.window_command = other.window_command;
        }
        if !other.modes.is_empty() {
            self.modes = other.modes;
        }
        self.sources.extend(other.sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Default values ----

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.port.connection.serial.is_none());
        assert!(config.port.connection.baud.is_none());
        assert!(config.device.vid.is_none());
        assert!(!config.debug);
        assert!(config.window_command.is_none());
        assert!(config.modes.is_empty());
        assert!(config.sources.is_empty());
    }

    // ---- Config merge ----

    #[test]
    fn test_config_merge_serial() {
        let mut base = Config::default();
        let mut other = Config::default();
        other.port.connection.serial = Some("/dev/ttyACM0".to_string());
        other.device.vid = Some(0x2341);

        base.merge(other);

        assert_eq!(base.port.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(base.device.vid, Some(0x2341));
        assert!(base.device.pid.is_none());
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.port.connection.serial = Some("/dev/ttyACM0".to_string());
        base.window_command = Some("xdotool getactivewindow getwindowname".to_string());
        base.debug = true;

        base.merge(Config::default());

        assert_eq!(base.port.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert!(base.window_command.is_some());
        assert!(base.debug);
    }

    #[test]
    fn test_config_merge_modes_replace() {
        let mode = |name: &str| ModeConfig {
            name: name.to_string(),
            ..ModeConfig::default()
        };

        let mut base = Config::default();
        base.modes = vec![mode("global-a"), mode("global-b")];

        let mut other = Config::default();
        other.modes = vec![mode("local")];
        base.merge(other);
        assert_eq!(base.modes, vec![mode("local")]);

        base.merge(Config::default());
        assert_eq!(base.modes.len(), 1);
    }

    // ---- TOML parsing ----

    #[test]
    fn test_config_from_toml() {
        let toml_str = r##"
debug = true
window_command = "xdotool getactivewindow getwindowname"

[port.connection]
serial = "/dev/ttyACM0"
baud = 115200

[device]
vid = 0x1b4f
pid = 0x9206

[[mode]]
name = "Gimp"
process = "gimp-2.10"
press_color = "#0080ff"

[mode.keys]
"2p" = ["k224p", "k29"]
"2r" = ["k224r"]
"R+" = ["mwi1"]

[[mode]]
name = "Fallback"
"##;
        let config = Config::parse(toml_str).unwrap();
        assert!(config.debug);
        assert_eq!(config.port.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.port.connection.baud, Some(115200));
        assert_eq!(config.device.vid, Some(0x1b4f));
        assert_eq!(config.device.pid, Some(0x9206));
        assert_eq!(config.modes.len(), 2);

        let gimp = &config.modes[0];
        assert_eq!(gimp.name, "Gimp");
        assert_eq!(gimp.process.as_deref(), Some("gimp-2.10"));
        assert_eq!(gimp.press_color.as_deref(), Some("#0080ff"));
        assert_eq!(gimp.keys["2p"], ["k224p", "k29"]);
        assert_eq!(gimp.keys.len(), 3);

        let fallback = &config.modes[1];
        assert!(fallback.process.is_none());
        assert!(fallback.window.is_none());
        assert!(fallback.keys.is_empty());
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config = Config::parse("").unwrap();
        assert!(config.port.connection.serial.is_none());
        assert!(config.modes.is_empty());
    }

    #[test]
    fn test_config_from_invalid_toml() {
        assert!(Config::parse("invalid toml [[[").is_err());
    }

    #[test]
    fn test_config_rejects_mode_without_name() {
        assert!(Config::parse("[[mode]]\nprocess = \"gimp\"\n").is_err());
    }

    // ---- Files ----

    #[test]
    fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[port.connection]\nserial = \"COM3\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.port.connection.serial.as_deref(), Some("COM3"));
        assert_eq!(config.sources, vec![path]);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_path(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_invalid_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "debug = maybe").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_global_config_path_is_toml() {
        if let Some(path) = Config::global_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
