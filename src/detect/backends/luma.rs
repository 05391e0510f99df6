use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult, SizeClass};
use crate::frame::expected_len;

const DEFAULT_THRESHOLD: u8 = 200;
const DEFAULT_MIN_PIXELS: usize = 16;
/// Boxes covering at least this share of the frame are `Large`.
const LARGE_AREA: f32 = 0.1;

/// Bright-region detector: one box around every pixel whose luma passes a threshold.
#[derive(Clone, Debug)]
pub struct LumaBackend {
    threshold: u8,
    min_pixels: usize,
}

impl LumaBackend {
    pub fn new(threshold: u8, min_pixels: usize) -> Self {
        Self {
            threshold,
            min_pixels: min_pixels.max(1),
        }
    }
}

impl Default for LumaBackend {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MIN_PIXELS)
    }
}

fn luma(rgb: &[u8]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

impl DetectorBackend for LumaBackend {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "luma backend expects {} RGB bytes, got {}",
                expected,
                pixels.len()
            ));
        }

        let w = width as usize;
        let threshold = self.threshold as f32;
        let mut count = 0usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        for (i, rgb) in pixels.chunks_exact(3).enumerate() {
            if luma(rgb) < threshold {
                continue;
            }
            let (x, y) = (i % w, i / w);
            count += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if count < self.min_pixels {
            return Ok(DetectionResult::default());
        }

        let box_w = (max_x - min_x + 1) as f32;
        let box_h = (max_y - min_y + 1) as f32;
        let confidence = (count as f32 / (box_w * box_h)).clamp(0.0, 1.0);
        let detection = Detection {
            x: min_x as f32 / width as f32,
            y: min_y as f32 / height as f32,
            w: box_w / width as f32,
            h: box_h / height as f32,
            confidence,
        };
        let size_class = if detection.area() >= LARGE_AREA {
            SizeClass::Large
        } else {
            SizeClass::Small
        };

        Ok(DetectionResult {
            motion_detected: true,
            detections: vec![detection],
            confidence,
            size_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn dark_frame_has_no_detection() -> Result<()> {
        let frame = Frame::solid(10, 10, [10, 10, 10])?;
        let result = LumaBackend::default().detect(frame.pixels(), 10, 10)?;
        assert!(!result.motion_detected);
        assert!(result.detections.is_empty());
        Ok(())
    }

    #[test]
    fn bright_square_is_boxed() -> Result<()> {
        let mut frame = Frame::solid(10, 10, [0, 0, 0])?;
        frame.fill_rect(2, 4, 6, 8, [255, 255, 255]);

        let result = LumaBackend::default().detect(frame.pixels(), 10, 10)?;
        assert!(result.motion_detected);
        assert_eq!(result.detections.len(), 1);

        let d = &result.detections[0];
        assert_eq!((d.x, d.y, d.w, d.h), (0.2, 0.4, 0.4, 0.4));
        assert_eq!(d.confidence, 1.0);
        assert_eq!(result.size_class, SizeClass::Large);
        Ok(())
    }

    #[test]
    fn tiny_spot_is_ignored() -> Result<()> {
        let mut frame = Frame::solid(10, 10, [0, 0, 0])?;
        frame.set_pixel(5, 5, [255, 255, 255]);
        let result = LumaBackend::default().detect(frame.pixels(), 10, 10)?;
        assert!(result.detections.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(LumaBackend::default().detect(&[0u8; 5], 2, 2).is_err());
    }
}
