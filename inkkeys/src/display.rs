//! Display geometry and the replay buffer.
//!
//! The panel is mounted so that switches 2..=5 sit in the right column and
//! 6..=9 in the left column, top to bottom, with the jog dial above them.
//!
//! ```text
//! +----------------------+  y = 0
//! |     jog label        |
//! +-----------+----------+
//! |  switch 9 | switch 5 |
//! |  switch 8 | switch 4 |
//! |  switch 7 | switch 3 |
//! |  switch 6 | switch 2 |
//! +-----------+----------+
//! |       title          |
//! +----------------------+  y = H
//! ```
//!
//! Coordinates are panel coordinates; the image itself is sent rotated.

use std::fmt;

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::protocol::DeviceCapabilities;

/// Height of the title and jog banners.
pub const BANNER_HEIGHT: u32 = 12;

/// An axis-aligned rectangle on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A named area of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Banner along the bottom edge, usually the mode name.
    Title,
    /// Label for the jog dial.
    Jog,
    /// Label for switch `n`. Switch 1 is the jog push button and shares
    /// the jog banner.
    Switch(u8),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Jog => f.write_str("jog"),
            Self::Switch(n) => write!(f, "switch {n}"),
        }
    }
}

/// Region table for one panel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    title: Rect,
    jog: Rect,
    /// Switches 2..=9.
    switches: [Rect; 8],
}

impl Layout {
    /// Compute the table from the reported panel size.
    pub fn new(caps: &DeviceCapabilities) -> Self {
        let w = caps.display_width;
        let h = caps.display_height;
        let b = BANNER_HEIGHT;

        let row = h / 4;
        let label_height = row.saturating_sub(2 * b);
        let half = w / 2;

        let switch = |n: u32| {
            let (x, slot) = if n <= 5 { (half, 5 - n) } else { (0, 9 - n) };
            Rect::new(x, slot * h / 4 + b, half, label_height)
        };

        Self {
            title: Rect::new(0, h.saturating_sub(b), w, b),
            jog: Rect::new(0, 0, w, b),
            switches: std::array::from_fn(|i| switch(i as u32 + 2)),
        }
    }

    /// Rectangle of a region.
    pub fn rect(&self, region: Region) -> Result<Rect> {
        match region {
            Region::Title => Ok(self.title),
            Region::Jog | Region::Switch(1) => Ok(self.jog),
            Region::Switch(n @ 2..=9) => Ok(self.switches[usize::from(n - 2)]),
            Region::Switch(_) => Err(Error::InvalidRegion(region.to_string())),
        }
    }

    /// Every drawable region, title first.
    pub fn regions() -> impl Iterator<Item = Region> {
        [Region::Title, Region::Jog]
            .into_iter()
            .chain((2..=9).map(Region::Switch))
    }
}

/// A bitmap sent to the panel since the last refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePatch {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Image as sent.
    pub bitmap: Bitmap,
}

/// Patches waiting to be resent after the next refresh.
#[derive(Debug, Default)]
pub struct ReplayBuffer {
    patches: Vec<ImagePatch>,
}

impl ReplayBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a patch. Overlapping patches are kept.
    pub fn record(&mut self, x: u32, y: u32, bitmap: Bitmap) {
        self.patches.push(ImagePatch { x, y, bitmap });
    }

    /// Patches in send order.
    pub fn patches(&self) -> &[ImagePatch] {
        &self.patches
    }

    /// Take every patch, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<ImagePatch> {
        std::mem::take(&mut self.patches)
    }

    /// Drop every patch.
    pub fn clear(&mut self) {
        self.patches.clear();
    }

    /// Number of buffered patches.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
