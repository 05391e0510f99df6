use serde::Serialize;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionResult {
    /// Did the frame change / contain anything of interest?
    pub motion_detected: bool,
    /// Bounding boxes (normalized 0..1 coordinates).
    pub detections: Vec<Detection>,
    /// Confidence of primary detection.
    pub confidence: f32,
    /// Size class (large/small object).
    pub size_class: SizeClass,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    #[default]
    Unknown,
    Small,
    Large,
}
