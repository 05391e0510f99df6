//! Drawing helpers for the display and annotate paths.
//!
//! Text layout is left to whatever renders the status line; on the frame we
//! only paint the status bar background and detection outlines.

use std::fmt::Display;

use crate::detect::DetectionResult;
use crate::frame::{Frame, Rgb};

/// Status bar size, anchored to the bottom-right corner.
pub const STATUS_BAR_WIDTH: u32 = 480;
pub const STATUS_BAR_HEIGHT: u32 = 25;

pub const WHITE: Rgb = [255, 255, 255];
pub const GREEN: Rgb = [0, 255, 0];

/// `"Sensor_1 = 3, Sensor_2 = 1, Sensor_3 = -"`; `-` marks "no value yet".
pub fn status_text<A: Display>(labels: &[String], values: &[Option<A>]) -> String {
    labels
        .iter()
        .zip(values)
        .map(|(label, value)| match value {
            Some(value) => format!("{} = {}", label, value),
            None => format!("{} = -", label),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Default sensor labels: `Sensor_1`, `Sensor_2`, ...
pub fn default_labels(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Sensor_{}", i)).collect()
}

/// Paint the status bar background, clipped for frames smaller than the bar.
pub fn draw_status_bar(frame: &mut Frame) {
    let x0 = frame.width.saturating_sub(STATUS_BAR_WIDTH);
    let y0 = frame.height.saturating_sub(STATUS_BAR_HEIGHT);
    let (x1, y1) = (frame.width, frame.height);
    frame.fill_rect(x0, y0, x1, y1, WHITE);
}

/// Outline every detection box (normalized coordinates) with a 1px border.
pub fn draw_detections(frame: &mut Frame, result: &DetectionResult) {
    let (fw, fh) = (frame.width as f32, frame.height as f32);
    for d in &result.detections {
        let x0 = (d.x * fw).floor().max(0.0) as u32;
        let y0 = (d.y * fh).floor().max(0.0) as u32;
        let x1 = ((d.x + d.w) * fw).ceil().min(fw) as u32;
        let y1 = ((d.y + d.h) * fh).ceil().min(fh) as u32;
        if x1 <= x0 || y1 <= y0 {
            continue;
        }
        frame.fill_rect(x0, y0, x1, y0 + 1, GREEN);
        frame.fill_rect(x0, y1 - 1, x1, y1, GREEN);
        frame.fill_rect(x0, y0, x0 + 1, y1, GREEN);
        frame.fill_rect(x1 - 1, y0, x1, y1, GREEN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use anyhow::Result;

    #[test]
    fn status_text_marks_missing_values() {
        let labels = default_labels(3);
        let text = status_text(&labels, &[Some(3u64), Some(1), None]);
        assert_eq!(text, "Sensor_1 = 3, Sensor_2 = 1, Sensor_3 = -");
    }

    #[test]
    fn status_bar_covers_bottom_right() -> Result<()> {
        let mut frame = Frame::solid(640, 480, [0, 0, 0])?;
        draw_status_bar(&mut frame);
        assert_eq!(frame.pixel(639, 479), Some(WHITE));
        assert_eq!(frame.pixel(160, 455), Some(WHITE));
        assert_eq!(frame.pixel(159, 479), Some([0, 0, 0]));
        assert_eq!(frame.pixel(639, 454), Some([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn status_bar_clips_on_small_frames() -> Result<()> {
        let mut frame = Frame::solid(8, 8, [0, 0, 0])?;
        draw_status_bar(&mut frame);
        assert_eq!(frame.pixel(0, 0), Some(WHITE));
        Ok(())
    }

    #[test]
    fn detection_box_outline_leaves_interior() -> Result<()> {
        let mut frame = Frame::solid(8, 8, [0, 0, 0])?;
        let result = DetectionResult {
            motion_detected: true,
            detections: vec![Detection {
                x: 0.25,
                y: 0.25,
                w: 0.5,
                h: 0.5,
                confidence: 1.0,
            }],
            ..DetectionResult::default()
        };
        draw_detections(&mut frame, &result);
        assert_eq!(frame.pixel(2, 2), Some(GREEN));
        assert_eq!(frame.pixel(5, 5), Some(GREEN));
        assert_eq!(frame.pixel(3, 3), Some([0, 0, 0]));
        assert_eq!(frame.pixel(6, 6), Some([0, 0, 0]));
        Ok(())
    }
}
