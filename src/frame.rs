//! RGB24 frame container produced by camera sources.
//!
//! - `Frame`: owned pixel buffer plus dimensions and a capture sequence number.
//!
//! Frames move by value from the camera worker through the primary slot to the
//! sink. Pixel length is validated at construction so drawing code can index
//! without re-checking.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Bytes per pixel for the RGB24 layout every source normalizes to.
pub const BYTES_PER_PIXEL: usize = 3;

pub type Rgb = [u8; 3];

pub struct Frame {
    pixels: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// 1-based capture counter assigned by the source.
    pub sequence: u64,

    /// Monotonic capture instant (for latency logging).
    captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// A frame filled with a single color.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Result<Self> {
        let len = expected_len(width, height)?;
        let pixels = color.iter().copied().cycle().take(len).collect();
        Self::new(pixels, width, height, 0)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let offset = self.offset(x, y)?;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if let Some(offset) = self.offset(x, y) {
            self.pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color);
        }
    }

    /// Fill the half-open rectangle `[x0, x1) x [y0, y1)`, clipped to the frame.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.set_pixel(x, y, color);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, 1).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, 1).is_ok());
    }

    #[test]
    fn solid_fills_every_pixel() -> Result<()> {
        let frame = Frame::solid(3, 2, [1, 2, 3])?;
        assert_eq!(frame.byte_len(), 18);
        assert_eq!(frame.pixel(2, 1), Some([1, 2, 3]));
        assert_eq!(frame.pixel(3, 0), None);
        Ok(())
    }

    #[test]
    fn fill_rect_clips_to_bounds() -> Result<()> {
        let mut frame = Frame::solid(4, 4, [0, 0, 0])?;
        frame.fill_rect(2, 2, 10, 10, [255, 255, 255]);
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(frame.pixel(2, 2), Some([255, 255, 255]));
        assert_eq!(frame.pixel(3, 3), Some([255, 255, 255]));
        Ok(())
    }

    #[test]
    fn debug_does_not_dump_pixels() -> Result<()> {
        let frame = Frame::solid(2, 2, [9, 9, 9])?;
        let rendered = format!("{:?}", frame);
        assert!(rendered.contains("bytes: 12"));
        Ok(())
    }
}
