//! Macro modes built from `[[mode]]` config tables.

use anyhow::{Context, Result, bail};
use inkkeys::{
    Bitmap, Device, Error, KeyCode, MacroEvent, Matcher, Mode, ModeEntry, PollInterval, Region,
    Rgb,
};
use log::debug;

use crate::config::{Config, ModeConfig};

/// A mode that assigns fixed macros and flashes the LED of pressed switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroMode {
    name: String,
    /// Every assignable key, in [`KeyCode::all`] order.
    keys: Vec<(KeyCode, Vec<MacroEvent>)>,
    press_color: Option<Rgb>,
}

impl MacroMode {
    /// Mode used when no modes are configured: clears every binding.
    pub fn idle() -> Self {
        Self {
            name: "Idle".to_string(),
            keys: KeyCode::all()
                .map(|code| (code, Vec::new()))
                .collect(),
            press_color: None,
        }
    }

    /// Validate a config table.
    pub fn from_config(config: &ModeConfig) -> Result<Self> {
        let mut mode = Self::idle();
        mode.name.clone_from(&config.name);

        for (token, events) in &config.keys {
            let code: KeyCode = token
                .parse()
                .with_context(|| format!("mode '{}': bad key", config.name))?;
            let events = events
                .iter()
                .map(|e| e.parse::<MacroEvent>())
                .collect::<inkkeys::Result<Vec<_>>>()
                .with_context(|| format!("mode '{}': bad macro for {token}", config.name))?;

            if let Some(slot) = mode
                .keys
                .iter_mut()
                .find(|(c, _)| *c == code)
            {
                slot.1 = events;
            }
        }

        mode.press_color = config
            .press_color
            .as_deref()
            .map(str::parse::<Rgb>)
            .transpose()
            .with_context(|| format!("mode '{}': bad press_color", config.name))?;

        Ok(mode)
    }

    /// Events assigned to `key`.
    pub fn events(&self, key: KeyCode) -> &[MacroEvent] {
        self.keys
            .iter()
            .find(|(c, _)| *c == key)
            .map(|(_, events)| events.as_slice())
            .unwrap_or_default()
    }

    fn draw_blank_regions(device: &mut Device) -> inkkeys::Result<()> {
        let layout = device
            .layout()
            .cloned()
            .ok_or(Error::NotConnected)?;

        for region in inkkeys::Layout::regions() {
            let (width, height) = layout.rect(region)?.size();
            let blank = Bitmap::blank(width, height);
            let bitmap = if region == Region::Title {
                blank.inverted()
            } else {
                blank
            };
            device.send_region(region, &bitmap)?;
        }
        Ok(())
    }

    fn register_press_feedback(&self, device: &mut Device) {
        let Some(color) = self.press_color else {
            return;
        };
        let led_count = device
            .capabilities()
            .map_or(0, |c| c.led_count);

        for n in 1..=inkkeys::protocol::SWITCH_COUNT {
            let index = usize::from(n - 1);
            if index >= led_count {
                break;
            }
            device.register_callback(KeyCode::Press(n), move |device| {
                let mut colors = vec![Rgb::BLACK; led_count];
                colors[index] = color;
                device.set_leds(&colors)
            });
        }
    }
}

impl Mode for MacroMode {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self, device: &mut Device) -> inkkeys::Result<()> {
        Self::draw_blank_regions(device)?;
        for code in KeyCode::all() {
            device.assign_key(code, self.events(code))?;
        }
        self.register_press_feedback(device);
        device.refresh(false)
    }

    fn deactivate(&mut self, device: &mut Device) -> inkkeys::Result<()> {
        device.clear_callbacks();
        Ok(())
    }

    fn poll(&mut self, _device: &mut Device) -> inkkeys::Result<PollInterval> {
        Ok(PollInterval::Disabled)
    }

    fn animate(&mut self, device: &mut Device) -> inkkeys::Result<()> {
        device.fade_leds()
    }
}

/// Matcher for a mode table: process name, window regex, or always.
fn matcher(config: &ModeConfig) -> Result<Matcher> {
    match (&config.process, &config.window) {
        (Some(_), Some(_)) => bail!("mode '{}' sets both process and window", config.name),
        (Some(process), None) => Ok(Matcher::Process(process.clone())),
        (None, Some(window)) => Matcher::window(window)
            .with_context(|| format!("mode '{}': bad window pattern", config.name)),
        (None, None) => Ok(Matcher::Always),
    }
}

/// Build the mode registry in config order.
pub fn build_entries(config: &Config) -> Result<Vec<ModeEntry>> {
    if config.modes.is_empty() {
        debug!("No modes configured, using the idle mode");
        return Ok(vec![ModeEntry::new(Box::new(MacroMode::idle()), Matcher::Always)]);
    }

    config
        .modes
        .iter()
        .map(|table| {
            let mode = MacroMode::from_config(table)?;
            Ok(ModeEntry::new(Box::new(mode), matcher(table)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use super::*;
    use crate::testing::{INFO_FIXTURE, MockPort};

    fn table(name: &str) -> ModeConfig {
        ModeConfig {
            name: name.to_string(),
            ..ModeConfig::default()
        }
    }

    fn connected(port: &MockPort) -> Device {
        let mut device = Device::new();
        device.connect(Box::new(port.clone())).unwrap();
        device
    }

    #[test]
    fn test_idle_clears_every_key() {
        let idle = MacroMode::idle();
        assert_eq!(idle.name(), "Idle");
        assert_eq!(idle.keys.len(), 20);
        assert!(idle.keys.iter().all(|(_, events)| events.is_empty()));
    }

    #[test]
    fn test_from_config_parses_keys_and_color() {
        let mut config = table("Gimp");
        config.keys = BTreeMap::from([
            ("2p".to_string(), vec!["k224p".to_string(), "k29".to_string()]),
            ("R+".to_string(), vec!["mwi1".to_string()]),
        ]);
        config.press_color = Some("#0080ff".to_string());

        let mode = MacroMode::from_config(&config).unwrap();
        assert_eq!(mode.name(), "Gimp");
        assert_eq!(
            mode.events(KeyCode::Press(2)),
            [MacroEvent::key_press(224), MacroEvent::key(29)]
        );
        assert_eq!(mode.events(KeyCode::JogCw).len(), 1);
        assert!(mode.events(KeyCode::Release(2)).is_empty());
        assert_eq!(mode.press_color, Some(Rgb::new(0x00, 0x80, 0xFF)));
    }

    #[test]
    fn test_from_config_rejects_bad_input() {
        let mut bad_key = table("A");
        bad_key.keys = BTreeMap::from([("0p".to_string(), vec![])]);
        assert!(MacroMode::from_config(&bad_key).is_err());

        let mut bad_event = table("B");
        bad_event.keys = BTreeMap::from([("3p".to_string(), vec!["x1".to_string()])]);
        let err = MacroMode::from_config(&bad_event).unwrap_err();
        assert!(format!("{err:#}").contains("mode 'B'"));

        let mut bad_color = table("C");
        bad_color.press_color = Some("blue".to_string());
        assert!(MacroMode::from_config(&bad_color).is_err());
    }

    #[test]
    fn test_build_entries_default_idle() {
        let entries = build_entries(&Config::default()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_build_entries_keeps_order() {
        let mut gimp = table("Gimp");
        gimp.process = Some("gimp".to_string());
        let mut term = table("Terminal");
        term.window = Some("Terminal".to_string());

        let config = Config {
            modes: vec![gimp, term, table("Default")],
            ..Config::default()
        };
        let entries = build_entries(&config).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_matcher_kinds() {
        let processes: HashSet<String> = ["gimp".to_string()].into();

        let mut by_process = table("P");
        by_process.process = Some("gimp".to_string());
        assert!(matcher(&by_process).unwrap().matches(&processes, None));

        let mut by_window = table("W");
        by_window.window = Some("Term".to_string());
        let m = matcher(&by_window).unwrap();
        assert!(m.matches(&HashSet::new(), Some("Terminal - bash")));
        assert!(!m.matches(&HashSet::new(), Some("My Terminal")));

        assert!(matches!(matcher(&table("A")).unwrap(), Matcher::Always));
    }

    #[test]
    fn test_matcher_rejects_both_and_bad_regex() {
        let mut both = table("Both");
        both.process = Some("gimp".to_string());
        both.window = Some("Gimp".to_string());
        assert!(matcher(&both).is_err());

        let mut bad = table("Bad");
        bad.window = Some("(".to_string());
        assert!(matcher(&bad).is_err());
    }

    #[test]
    fn test_activate_draws_assigns_and_refreshes() {
        let port = MockPort::with_input(INFO_FIXTURE);
        let mut device = connected(&port);
        port.push_input(b"ok\nok\n");

        let mut config = table("Media");
        config.keys = BTreeMap::from([("2p".to_string(), vec!["c233".to_string()])]);
        let mut mode = MacroMode::from_config(&config).unwrap();
        mode.activate(&mut device).unwrap();

        let written = port.written_text();

        // Ten regions, sent once and replayed once after the partial refresh.
        assert_eq!(written.matches("D ").count(), 20);
        assert_eq!(written.matches("A ").count(), 20);
        assert!(written.contains("A 2p c233\n"));
        assert!(written.contains("A 9r\n"));
        assert!(written.contains("R p\n"));
        assert!(written.ends_with("R o\n"));
        assert_eq!(device.pending_patches(), 0);
    }

    #[test]
    fn test_press_color_lights_the_pressed_switch() {
        let port = MockPort::with_input(INFO_FIXTURE);
        let mut device = connected(&port);
        port.push_input(b"ok\nok\n");

        let mut config = table("Colors");
        config.press_color = Some("ff0000".to_string());
        let mut mode = MacroMode::from_config(&config).unwrap();
        mode.activate(&mut device).unwrap();

        port.push_input(b"3p\n");
        device.poll().unwrap();

        assert!(port.written_text().contains("L 000000 000000 ff0000 000000"));
        assert!(device.leds_active());

        mode.deactivate(&mut device).unwrap();
        port.push_input(b"4p\n");
        device.poll().unwrap();
        assert!(!port.written_text().contains("L 000000 000000 000000 ff0000"));
    }

    #[test]
    fn test_poll_is_disabled() {
        let mut device = Device::new();
        let mut mode = MacroMode::idle();
        assert_eq!(mode.poll(&mut device).unwrap(), PollInterval::Disabled);
    }

    #[test]
    fn test_activate_without_device_fails() {
        let mut device = Device::new();
        let err = MacroMode::idle().activate(&mut device).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
