use std::sync::Arc;

use crate::error::{MixError, MixResult};

/// A fixed-resolution RGB8 pixel buffer, row-major, top-left origin.
///
/// Storage is shared (`Arc<[u8]>`), so cloning a `Frame` is a pointer copy.
/// That makes `current_frame()` a non-blocking read everywhere and lets a
/// producer thread hand a finished frame across a mutex slot without copying
/// pixels (see [`FrameFeed`](crate::FrameFeed)). Pixel data is immutable once
/// a frame is built; every transform produces a new frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl Frame {
    /// Build a frame from a raw RGB8 buffer of exactly `width * height * 3` bytes.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> MixResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| MixError::validation("frame size overflow"))?;
        if data.len() != expected {
            return Err(MixError::validation(format!(
                "frame buffer is {} bytes, expected {} ({}x{}x3)",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    /// Internal constructor for transform outputs whose length is correct by
    /// construction.
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize) * 3);
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// An all-black frame, the engine's universal fallback picture.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 3].into(),
        }
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let px = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(px * 3);
        for _ in 0..px {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Build a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB8 bytes, `width * height * 3` long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether this frame matches the given resolution.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Pixel at `(x, y)`. Panics on out-of-bounds coordinates; intended for
    /// tests and diagnostics, not the per-pixel hot path.
    pub fn px(&self, x: u32, y: u32) -> [u8; 3] {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// A single-channel 8-bit alpha plane parallel to a [`Frame`], used by keyed
/// sources (stingers, screen masks). 255 is fully opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matte {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl Matte {
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> MixResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| MixError::validation("matte size overflow"))?;
        if data.len() != expected {
            return Err(MixError::validation(format!(
                "matte buffer is {} bytes, expected {} ({}x{})",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    /// A fully opaque matte.
    pub fn opaque(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![255u8; (width as usize) * (height as usize)].into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_validates_length() {
        assert!(Frame::from_rgb(2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgb(2, 2, vec![0u8; 11]).is_err());
    }

    #[test]
    fn black_and_solid_pixels() {
        let f = Frame::black(3, 2);
        assert_eq!(f.px(2, 1), [0, 0, 0]);

        let f = Frame::solid(3, 2, [10, 20, 30]);
        assert_eq!(f.px(0, 0), [10, 20, 30]);
        assert_eq!(f.px(2, 1), [10, 20, 30]);
        assert!(f.matches(3, 2));
        assert!(!f.matches(2, 3));
    }

    #[test]
    fn from_fn_addresses_top_left_origin() {
        let f = Frame::from_fn(2, 2, |x, y| [x as u8, y as u8, 0]);
        assert_eq!(f.px(0, 0), [0, 0, 0]);
        assert_eq!(f.px(1, 0), [1, 0, 0]);
        assert_eq!(f.px(0, 1), [0, 1, 0]);
    }

    #[test]
    fn clone_shares_storage() {
        let a = Frame::solid(64, 64, [1, 2, 3]);
        let b = a.clone();
        assert!(std::ptr::eq(a.data(), b.data()));
    }

    #[test]
    fn matte_validates_length() {
        assert!(Matte::from_gray(4, 2, vec![0u8; 8]).is_ok());
        assert!(Matte::from_gray(4, 2, vec![0u8; 9]).is_err());
        assert_eq!(Matte::opaque(4, 2).data()[0], 255);
    }
}
