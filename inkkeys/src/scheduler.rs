//! Mode selection and the 30 fps main loop.
//!
//! Each iteration runs, in order:
//!
//! 1. refresh the foreground process names (every 5 s),
//! 2. refresh the active window and pick the first matching mode (every 0.5 s),
//! 3. poll the active mode when its requested interval has elapsed,
//! 4. animate the active mode, then service the device,
//! 5. sleep out the rest of the 1/30 s frame.

use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use regex::Regex;

use crate::error::{Error, Result};
use crate::session::Device;
use crate::supervisor::CancelToken;

/// Frame budget of one loop iteration.
pub const FRAME: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// How often the process list is refreshed.
pub const PROCESS_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// How often the active window is checked and the mode re-selected.
pub const MODE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// When a mode wants its next `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    /// Poll again once this much time has passed.
    After(Duration),
    /// Do not poll again until the mode is re-activated.
    Disabled,
}

/// Application behaviour bound to the keypad while it is active.
pub trait Mode {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Take over the keypad: assign keys, draw labels, register callbacks.
    fn activate(&mut self, device: &mut Device) -> Result<()>;

    /// Release the keypad before another mode is activated.
    fn deactivate(&mut self, device: &mut Device) -> Result<()>;

    /// Periodic work. The return value schedules the next call.
    fn poll(&mut self, device: &mut Device) -> Result<PollInterval>;

    /// Per-frame work, typically LED animation.
    fn animate(&mut self, device: &mut Device) -> Result<()>;
}

/// Source of the desktop state modes are matched against.
pub trait ContextProvider {
    /// Names of the running processes.
    fn process_names(&mut self) -> HashSet<String>;

    /// Name of the focused window, `None` if it cannot be determined.
    fn active_window(&mut self) -> Option<String>;
}

/// Condition under which a mode is selected.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// A process with this exact name is running.
    Process(String),
    /// The active window name matches this pattern from its start.
    Window(Regex),
    /// Always.
    Always,
}

impl Matcher {
    /// Build a window matcher. The pattern is anchored at the start of the
    /// window name.
    pub fn window(pattern: &str) -> Result<Self> {
        Regex::new(&format!("^(?:{pattern})"))
            .map(Self::Window)
            .map_err(|e| Error::Config(format!("invalid window pattern {pattern:?}: {e}")))
    }

    /// Whether the current desktop state selects this matcher.
    pub fn matches(&self, processes: &HashSet<String>, window: Option<&str>) -> bool {
        match self {
            Self::Process(name) => processes.contains(name),
            Self::Window(pattern) => window.is_some_and(|w| pattern.is_match(w)),
            Self::Always => true,
        }
    }
}

/// A mode plus its matcher.
pub struct ModeEntry {
    /// Behaviour.
    pub mode: Box<dyn Mode>,
    /// Selection condition.
    pub matcher: Matcher,
}

impl ModeEntry {
    /// Pair a mode with a matcher.
    pub fn new(mode: Box<dyn Mode>, matcher: Matcher) -> Self {
        Self { mode, matcher }
    }
}

impl fmt::Debug for ModeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeEntry")
            .field("mode", &self.mode.name())
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// Runs the active mode against a connected device.
pub struct Scheduler {
    entries: Vec<ModeEntry>,
    context: Box<dyn ContextProvider>,
    current: Option<usize>,
    poll_interval: PollInterval,
    last_poll: Option<Instant>,
    last_process_scan: Option<Instant>,
    last_mode_check: Option<Instant>,
    processes: HashSet<String>,
    window: Option<String>,
}

impl Scheduler {
    /// Create a scheduler. Entries are matched in order; the first wins.
    pub fn new(entries: Vec<ModeEntry>, context: Box<dyn ContextProvider>) -> Self {
        Self {
            entries,
            context,
            current: None,
            poll_interval: PollInterval::After(Duration::ZERO),
            last_poll: None,
            last_process_scan: None,
            last_mode_check: None,
            processes: HashSet::new(),
            window: None,
        }
    }

    /// Name of the active mode.
    pub fn current_mode(&self) -> Option<&str> {
        self.current
            .map(|i| self.entries[i].mode.name())
    }

    /// Forget the active mode and all timers, for a fresh connection.
    pub fn reset(&mut self) {
        self.current = None;
        self.poll_interval = PollInterval::After(Duration::ZERO);
        self.last_poll = None;
        self.last_process_scan = None;
        self.last_mode_check = None;
    }

    /// Run frames until `cancel` is set or something fails.
    pub fn run(&mut self, device: &mut Device, cancel: &CancelToken) -> Result<()> {
        self.reset();
        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.tick(device, started)?;

            let elapsed = started.elapsed();
            if elapsed < FRAME {
                thread::sleep(FRAME - elapsed);
            }
        }
        Ok(())
    }

    /// One loop iteration at `now`, without the trailing sleep.
    pub fn tick(&mut self, device: &mut Device, now: Instant) -> Result<()> {
        if is_due(self.last_process_scan, now, PROCESS_SCAN_INTERVAL) {
            self.processes = self.context.process_names();
            self.last_process_scan = Some(now);
        }

        if is_due(self.last_mode_check, now, MODE_CHECK_INTERVAL) {
            if let Some(window) = self.context.active_window() {
                if self.window.as_deref() != Some(window.as_str()) {
                    debug!("Active window: {window}");
                }
                self.window = Some(window);
            }
            self.select_mode(device)?;
            self.last_mode_check = Some(now);
        }

        let Some(index) = self.current else {
            device.poll()?;
            return Ok(());
        };
        let mode = &mut self.entries[index].mode;

        if let PollInterval::After(interval) = self.poll_interval {
            if is_due(self.last_poll, now, interval) {
                self.poll_interval = mode.poll(device)?;
                self.last_poll = Some(now);
            }
        }

        mode.animate(device)?;
        device.poll()?;
        Ok(())
    }

    fn select_mode(&mut self, device: &mut Device) -> Result<()> {
        let window = self.window.as_deref();
        let Some(selected) = self
            .entries
            .iter()
            .position(|e| e.matcher.matches(&self.processes, window))
        else {
            return Ok(());
        };

        if self.current == Some(selected) {
            return Ok(());
        }

        if let Some(previous) = self.current.take() {
            debug!("Deactivating mode {}", self.entries[previous].mode.name());
            self.entries[previous]
                .mode
                .deactivate(device)?;
        }

        let entry = &mut self.entries[selected];
        info!("Activating mode {}", entry.mode.name());
        entry.mode.activate(device)?;
        self.current = Some(selected);
        self.poll_interval = PollInterval::After(Duration::ZERO);
        Ok(())
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("entries", &self.entries)
            .field("current", &self.current_mode())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

fn is_due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.is_none_or(|last| now.saturating_duration_since(last) >= interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::protocol::KeyCode;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FIXTURE: &[u8] =
        b"Inkkeys\nTEST 0\nN_LED 9\nDISP_W 212\nDISP_H 104\nROT_CIRCLE_STEPS 24\nDone\n";

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        interval: PollInterval,
        log: Log,
    }

    impl Recorder {
        fn boxed(name: &'static str, interval: PollInterval, log: &Log) -> Box<dyn Mode> {
            Box::new(Self {
                name,
                interval,
                log: Arc::clone(log),
            })
        }

        fn note(&self, what: &str) {
            self.log
                .lock()
                .push(format!("{}.{what}", self.name));
        }
    }

    impl Mode for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn activate(&mut self, _: &mut Device) -> Result<()> {
            self.note("activate");
            Ok(())
        }

        fn deactivate(&mut self, _: &mut Device) -> Result<()> {
            self.note("deactivate");
            Ok(())
        }

        fn poll(&mut self, _: &mut Device) -> Result<PollInterval> {
            self.note("poll");
            Ok(self.interval)
        }

        fn animate(&mut self, _: &mut Device) -> Result<()> {
            self.note("animate");
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeDesktop {
        state: Arc<Mutex<(HashSet<String>, Option<String>)>>,
    }

    impl FakeDesktop {
        fn set(&self, processes: &[&str], window: Option<&str>) {
            *self.state.lock() = (
                processes
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                window.map(ToString::to_string),
            );
        }
    }

    impl ContextProvider for FakeDesktop {
        fn process_names(&mut self) -> HashSet<String> {
            self.state.lock().0.clone()
        }

        fn active_window(&mut self) -> Option<String> {
            self.state.lock().1.clone()
        }
    }

    fn connected() -> (Device, MockPort) {
        let port = MockPort::with_input(FIXTURE);
        let mut device = Device::new();
        device
            .connect(Box::new(port.clone()))
            .unwrap();
        (device, port)
    }

    fn entries(log: &Log, interval: PollInterval) -> Vec<ModeEntry> {
        vec![
            ModeEntry::new(
                Recorder::boxed("A", interval, log),
                Matcher::Process("x".into()),
            ),
            ModeEntry::new(
                Recorder::boxed("B", interval, log),
                Matcher::window("Y").unwrap(),
            ),
        ]
    }

    fn count(log: &Log, what: &str) -> usize {
        log.lock()
            .iter()
            .filter(|e| *e == what)
            .count()
    }

    #[test]
    fn test_priority_follows_order() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&["x"], Some("Ysomething"));
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(desktop),
        );
        let (mut device, _port) = connected();

        scheduler
            .tick(&mut device, Instant::now())
            .unwrap();

        assert_eq!(scheduler.current_mode(), Some("A"));
        assert_eq!(
            *log.lock(),
            vec!["A.activate", "A.poll", "A.animate"]
        );
    }

    #[test]
    fn test_window_pattern_anchored_at_start() {
        let x = Matcher::window("Y").unwrap();
        let none = HashSet::new();
        assert!(x.matches(&none, Some("Ysomething")));
        assert!(!x.matches(&none, Some("xY")));
        assert!(!x.matches(&none, None));

        let alt = Matcher::window("gimp|Blender").unwrap();
        assert!(alt.matches(&none, Some("Blender 4.2")));
        assert!(!alt.matches(&none, Some("my gimp")));

        assert!(Matcher::window("(").is_err());
    }

    #[test]
    fn test_switch_deactivates_before_activating() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&["x"], Some("Ysomething"));
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(desktop.clone()),
        );
        let (mut device, _port) = connected();
        let start = Instant::now();

        scheduler.tick(&mut device, start).unwrap();
        desktop.set(&[], Some("Ysomething"));
        // Process list is only rescanned after 5 s.
        scheduler
            .tick(&mut device, start + Duration::from_secs(1))
            .unwrap();
        assert_eq!(scheduler.current_mode(), Some("A"));

        log.lock().clear();
        scheduler
            .tick(&mut device, start + Duration::from_secs(6))
            .unwrap();

        assert_eq!(scheduler.current_mode(), Some("B"));
        assert_eq!(
            *log.lock(),
            vec!["A.deactivate", "B.activate", "B.poll", "B.animate"]
        );
    }

    #[test]
    fn test_poll_cadence() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&["x"], None);
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::After(Duration::from_secs(1))),
            Box::new(desktop),
        );
        let (mut device, _port) = connected();
        let start = Instant::now();

        for ms in [0, 500, 999, 1000, 1200] {
            scheduler
                .tick(&mut device, start + Duration::from_millis(ms))
                .unwrap();
        }

        assert_eq!(count(&log, "A.poll"), 2);
        assert_eq!(count(&log, "A.animate"), 5);
        assert_eq!(count(&log, "A.activate"), 1);
    }

    #[test]
    fn test_disabled_poll_until_reactivated() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&["x"], Some("Y"));
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(desktop.clone()),
        );
        let (mut device, _port) = connected();
        let start = Instant::now();

        for s in 0..4 {
            scheduler
                .tick(&mut device, start + Duration::from_secs(s))
                .unwrap();
        }
        assert_eq!(count(&log, "A.poll"), 1);

        desktop.set(&[], Some("Y"));
        scheduler
            .tick(&mut device, start + Duration::from_secs(5))
            .unwrap();
        assert_eq!(count(&log, "B.poll"), 1);
    }

    #[test]
    fn test_failed_window_lookup_keeps_previous() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&[], Some("Ysomething"));
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(desktop.clone()),
        );
        let (mut device, _port) = connected();
        let start = Instant::now();

        scheduler.tick(&mut device, start).unwrap();
        desktop.set(&[], None);
        scheduler
            .tick(&mut device, start + Duration::from_secs(1))
            .unwrap();

        assert_eq!(scheduler.current_mode(), Some("B"));
        assert_eq!(count(&log, "B.deactivate"), 0);
    }

    #[test]
    fn test_no_match_still_services_device() {
        let log = Log::default();
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(FakeDesktop::default()),
        );
        let (mut device, port) = connected();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        device.register_callback(KeyCode::Press(7), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        port.push_input(b"7p\n");

        scheduler
            .tick(&mut device, Instant::now())
            .unwrap();

        assert_eq!(scheduler.current_mode(), None);
        assert!(log.lock().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_stops_on_cancel() {
        let log = Log::default();
        let desktop = FakeDesktop::default();
        desktop.set(&["x"], None);
        let mut scheduler = Scheduler::new(
            entries(&log, PollInterval::Disabled),
            Box::new(desktop),
        );
        let (mut device, _port) = connected();
        let cancel = CancelToken::new();
        cancel.cancel();

        scheduler
            .run(&mut device, &cancel)
            .unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_run_caps_frame_rate() {
        struct CancelAfter {
            frames: usize,
            limit: usize,
            cancel: CancelToken,
        }
        impl Mode for CancelAfter {
            fn name(&self) -> &str {
                "frames"
            }
            fn activate(&mut self, _: &mut Device) -> Result<()> {
                Ok(())
            }
            fn deactivate(&mut self, _: &mut Device) -> Result<()> {
                Ok(())
            }
            fn poll(&mut self, _: &mut Device) -> Result<PollInterval> {
                Ok(PollInterval::Disabled)
            }
            fn animate(&mut self, _: &mut Device) -> Result<()> {
                self.frames += 1;
                if self.frames == self.limit {
                    self.cancel.cancel();
                }
                Ok(())
            }
        }

        let cancel = CancelToken::new();
        let frames = 5;
        let mut scheduler = Scheduler::new(
            vec![ModeEntry::new(
                Box::new(CancelAfter {
                    frames: 0,
                    limit: frames,
                    cancel: cancel.clone(),
                }),
                Matcher::Always,
            )],
            Box::new(FakeDesktop::default()),
        );
        let (mut device, port) = connected();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        device.register_callback(KeyCode::Press(1), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        // One line is serviced per frame.
        port.push_input(&b"1p\n".repeat(frames + 3));

        let started = Instant::now();
        scheduler
            .run(&mut device, &cancel)
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), frames);
        assert!(started.elapsed() >= FRAME * (frames as u32 - 1));
    }

    #[test]
    fn test_mode_error_propagates() {
        struct Failing;
        impl Mode for Failing {
            fn name(&self) -> &str {
                "failing"
            }
            fn activate(&mut self, _: &mut Device) -> Result<()> {
                Err(Error::Mode("boom".into()))
            }
            fn deactivate(&mut self, _: &mut Device) -> Result<()> {
                Ok(())
            }
            fn poll(&mut self, _: &mut Device) -> Result<PollInterval> {
                Ok(PollInterval::Disabled)
            }
            fn animate(&mut self, _: &mut Device) -> Result<()> {
                Ok(())
            }
        }

        let mut scheduler = Scheduler::new(
            vec![ModeEntry::new(Box::new(Failing), Matcher::Always)],
            Box::new(FakeDesktop::default()),
        );
        let (mut device, _port) = connected();

        let err = scheduler
            .tick(&mut device, Instant::now())
            .unwrap_err();
        assert!(matches!(err, Error::Mode(_)));
        assert_eq!(scheduler.current_mode(), None);
    }
}
