//! Rectangular 1-bit bitmaps for the e-ink panel.

use std::fmt;

/// A 1-bit image.
///
/// Set pixels are white (paper), cleared pixels are black (ink), matching the
/// bit values the panel expects.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl Bitmap {
    /// A bitmap with every pixel set to `white`.
    pub fn filled(width: u32, height: u32, white: bool) -> Self {
        Self {
            width,
            height,
            pixels: vec![white; (width as usize) * (height as usize)],
        }
    }

    /// An all-white bitmap.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::filled(width, height, true)
    }

    /// Build a bitmap from row-major pixels.
    ///
    /// Returns `None` if the pixel count does not match the size.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<bool>) -> Option<Self> {
        (pixels.len() == (width as usize) * (height as usize)).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel value, `None` outside the bitmap.
    pub fn get(&self, x: u32, y: u32) -> Option<bool> {
        (x < self.width && y < self.height).then(|| self.pixels[self.index(x, y)])
    }

    /// Set one pixel; coordinates outside the bitmap are ignored.
    pub fn set(&mut self, x: u32, y: u32, white: bool) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.pixels[index] = white;
        }
    }

    /// Swap black and white.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self
                .pixels
                .iter()
                .map(|p| !p)
                .collect(),
        }
    }

    /// Nearest-neighbour rescale.
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if (width, height) == self.size() {
            return self.clone();
        }

        let mut out = Self::blank(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }

        for y in 0..height {
            let src_y = (u64::from(y) * u64::from(self.height) / u64::from(height)) as u32;
            for x in 0..width {
                let src_x = (u64::from(x) * u64::from(self.width) / u64::from(width)) as u32;
                out.set(x, y, self.pixels[self.index(src_x, src_y)]);
            }
        }
        out
    }

    /// Wire payload: the image turned 180°, row-major, MSB first.
    ///
    /// Bits are packed continuously across rows into `ceil(w*h/8)` bytes.
    /// Turning the image by 180° is the same as walking the pixels backwards.
    pub fn pack_rotated(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.pixels.len().div_ceil(8)];
        for (i, &white) in self
            .pixels
            .iter()
            .rev()
            .enumerate()
        {
            if white {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}
