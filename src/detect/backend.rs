use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detector backend trait.
///
/// Each batch partition owns its own backend instance, so implementations
/// need `Send` but not `Sync`. Pixels are RGB24, row-major.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations must treat the pixel slice as read-only and ephemeral.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook, run once per partition thread before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
