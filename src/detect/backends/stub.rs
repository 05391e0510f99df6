use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DetectionResult, SizeClass};

/// Stub backend for testing. Flags a frame whose pixel hash differs from the previous one.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        let current_hash: [u8; 32] = Sha256::digest(pixels).into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        if motion {
            Ok(DetectionResult {
                motion_detected: true,
                detections: vec![],
                confidence: 0.85,
                size_class: SizeClass::Large,
            })
        } else {
            Ok(DetectionResult::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_detects_change() -> Result<()> {
        let mut backend = StubBackend::new();

        let r1 = backend.detect(b"frame1", 2, 1)?;
        assert!(!r1.motion_detected);
        assert_eq!(r1.size_class, SizeClass::Unknown);

        let r2 = backend.detect(b"frame2", 2, 1)?;
        assert!(r2.motion_detected);
        assert_eq!(r2.confidence, 0.85);

        let r3 = backend.detect(b"frame2", 2, 1)?;
        assert!(!r3.motion_detected);
        Ok(())
    }
}
