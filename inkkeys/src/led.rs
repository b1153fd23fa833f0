//! LED colors and the hold-then-fade animation.
//!
//! After `set`, colors stay solid for [`HOLD`], then fade linearly to black
//! over [`FADE`]. One final all-black frame is emitted and the animator goes
//! idle until the next `set`.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Solid phase after the colors were set.
pub const HOLD: Duration = Duration::from_millis(3500);

/// Linear fade to black following the hold phase.
pub const FADE: Duration = Duration::from_millis(500);

/// A 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rgb(pub u32);

impl Rgb {
    /// Black, LED off.
    pub const BLACK: Self = Self(0);

    /// Build from channels.
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// `(r, g, b)`.
    pub fn channels(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }

    /// Scale each channel by `factor` (0..=1), truncating per channel.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |c: u8| (f64::from(c) * factor) as u8;
        let (r, g, b) = self.channels();
        Self::new(scale(r), scale(g), scale(b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0 & 0x00FF_FFFF)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .unwrap_or(s);
        if hex.len() != 6 {
            return Err(Error::Config(format!("color {s:?} is not six hex digits")));
        }
        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| Error::Config(format!("color {s:?} is not six hex digits")))
    }
}

/// Current LED colors plus the moment they were set.
#[derive(Debug, Default)]
pub struct LedAnimator {
    state: Option<(Vec<Rgb>, Instant)>,
}

impl LedAnimator {
    /// Create an idle animator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the colors and restart the hold timer.
    pub fn set(&mut self, colors: Vec<Rgb>, now: Instant) {
        self.state = Some((colors, now));
    }

    /// Forget any active colors without emitting anything.
    pub fn clear(&mut self) {
        self.state = None;
    }

    /// Whether colors are being held or faded.
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Next frame to send, if any.
    ///
    /// `led_count` sizes the final all-black frame.
    pub fn step(&mut self, now: Instant, led_count: usize) -> Option<Vec<Rgb>> {
        let (colors, set_at) = self.state.as_ref()?;
        let elapsed = now.saturating_duration_since(*set_at);

        if elapsed < HOLD {
            return None;
        }

        if elapsed >= HOLD + FADE {
            self.state = None;
            return Some(vec![Rgb::BLACK; led_count]);
        }

        let p = (HOLD + FADE - elapsed).as_secs_f64() / FADE.as_secs_f64();
        Some(
            colors
                .iter()
                .map(|c| c.scaled(p))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::new(0xFF, 0x80, 0x01).to_string(), "ff8001");
        assert_eq!(Rgb::BLACK.to_string(), "000000");
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), Rgb::new(0, 255, 0));
        assert_eq!("#0000ff".parse::<Rgb>().unwrap(), Rgb::new(0, 0, 255));
        assert!("fff".parse::<Rgb>().is_err());
        assert!("gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_scaled_truncates_per_channel() {
        assert_eq!(Rgb::new(255, 3, 1).scaled(0.5), Rgb::new(127, 1, 0));
    }

    #[test]
    fn test_hold_emits_nothing() {
        let start = Instant::now();
        let mut leds = LedAnimator::new();
        leds.set(vec![Rgb::new(200, 100, 50)], start);

        for t in [0.0, 1.0, 3.0, 3.49] {
            assert_eq!(leds.step(at(start, t), 1), None, "t = {t}");
        }
        assert!(leds.is_active());
    }

    #[test]
    fn test_fade_decreases_monotonically() {
        let start = Instant::now();
        let original = Rgb::new(200, 100, 50);
        let mut leds = LedAnimator::new();
        leds.set(vec![original], start);

        let mut previous = original.channels();
        for t in [3.51, 3.6, 3.75, 3.9, 3.99] {
            let frame = leds.step(at(start, t), 1).expect("fading frame");
            let (r, g, b) = frame[0].channels();
            assert!(r < 200 && g < 100 && b < 50, "t = {t}");
            assert!(r <= previous.0 && g <= previous.1 && b <= previous.2);
            previous = (r, g, b);
        }
    }

    #[test]
    fn test_fade_midpoint() {
        let start = Instant::now();
        let mut leds = LedAnimator::new();
        leds.set(vec![Rgb::new(200, 100, 50)], start);

        let frame = leds.step(at(start, 3.75), 1).unwrap();
        assert_eq!(frame, vec![Rgb::new(100, 50, 25)]);
    }

    #[test]
    fn test_final_black_frame_once() {
        let start = Instant::now();
        let mut leds = LedAnimator::new();
        leds.set(vec![Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)], start);

        let frame = leds.step(at(start, 4.0), 9).unwrap();
        assert_eq!(frame, vec![Rgb::BLACK; 9]);
        assert!(!leds.is_active());

        assert_eq!(leds.step(at(start, 4.1), 9), None);
        assert_eq!(leds.step(at(start, 60.0), 9), None);
    }

    #[test]
    fn test_idle_emits_nothing() {
        let mut leds = LedAnimator::new();
        assert_eq!(leds.step(Instant::now(), 9), None);
    }
}
