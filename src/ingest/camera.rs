//! Camera frame source.
//!
//! This module provides `CameraSource`, the primary source of the fusion
//! pipeline. The camera source is responsible for:
//! - Opening a local device node (e.g., /dev/video0) at the requested resolution
//! - Capturing frames and normalizing them to RGB24
//! - Reporting end-of-stream or device errors as source faults
//! - Releasing the device explicitly when the orchestrator asks
//!
//! `stub://` devices synthesize frames so the pipeline can run without hardware.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

#[cfg(feature = "ingest-v4l2")]
use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::frame::{expected_len, Frame};
use crate::source::Source;

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>".
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Requested capture rate. 0 leaves the device default.
    pub target_fps: u32,
    /// Synthetic devices report end-of-stream after this many frames.
    pub frame_limit: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera0".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
            frame_limit: None,
        }
    }
}

/// Map a numeric camera id to its device node.
pub fn device_path_for_id(id: u32) -> String {
    format!("/dev/video{}", id)
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(device::DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero, got {}x{}",
                config.width,
                config.height
            ));
        }
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(device::DeviceCamera::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera device {} requires the ingest-v4l2 feature",
                config.device
            ))
        }
    }

    /// Open the device. Must be called before the first frame.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.connect(),
        }
    }

    /// Capture the next frame. Blocks on real devices.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }

    /// Close the device. Safe to call more than once.
    pub fn disconnect(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.disconnect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.disconnect(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.connected,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.is_connected(),
        }
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.stats(),
        }
    }

    fn device(&self) -> &str {
        match &self.backend {
            CameraBackend::Synthetic(camera) => &camera.config.device,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.device(),
        }
    }
}

impl Source for CameraSource {
    type Sample = Frame;

    fn name(&self) -> &str {
        self.device()
    }

    fn produce(&mut self) -> Result<Frame> {
        self.next_frame()
    }

    fn release(&mut self) -> Result<()> {
        self.disconnect();
        Ok(())
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
    pub width: u32,
    pub height: u32,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and hardware-free runs
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    connected: bool,
    frame_count: u64,
    /// Simulated scene state; changes every 50 frames.
    scene_state: u8,
    last_frame: Option<Instant>,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            connected: false,
            frame_count: 0,
            scene_state: 0,
            last_frame: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "CameraSource: connected to {} ({}x{}, synthetic)",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!("CameraSource: released {}", self.config.device);
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera {} not connected", self.config.device));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!(
                    "end of stream on {} after {} frames",
                    self.config.device,
                    self.frame_count
                ));
            }
        }
        self.pace();
        self.frame_count += 1;

        let pixels = self.generate_synthetic_pixels()?;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    /// Hold frames to `target_fps`; 0 runs unpaced.
    fn pace(&mut self) {
        if self.config.target_fps > 0 {
            let period = Duration::from_secs(1) / self.config.target_fps;
            if let Some(last) = self.last_frame {
                let elapsed = last.elapsed();
                if elapsed < period {
                    std::thread::sleep(period - elapsed);
                }
            }
        }
        self.last_frame = Some(Instant::now());
    }

    /// Moving gradient with a small random flicker so consecutive frames differ.
    fn generate_synthetic_pixels(&mut self) -> Result<Vec<u8>> {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let flicker: u8 = rand::random::<u8>() % 4;
        let mut pixels = vec![0u8; expected_len(self.config.width, self.config.height)?];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64 + flicker as u64)
                % 256) as u8;
        }
        Ok(pixels)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
            width: self.config.width,
            height: self.config.height,
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device source
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;

    use super::{normalize_to_rgb, CameraConfig, CameraStats, PixelFormat};
    use crate::frame::Frame;

    pub(super) struct DeviceCamera {
        config: CameraConfig,
        state: Option<DeviceState>,
        format: PixelFormat,
        frame_count: u64,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn new(config: CameraConfig) -> Self {
            Self {
                active_width: config.width,
                active_height: config.height,
                config,
                state: None,
                format: PixelFormat::Rgb24,
                frame_count: 0,
            }
        }

        pub(super) fn device(&self) -> &str {
            &self.config.device
        }

        pub(super) fn is_connected(&self) -> bool {
            self.state.is_some()
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.config.device)
                .with_context(|| format!("open camera device {}", self.config.device))?;
            let mut format = device.format().context("read camera format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        self.config.device,
                        err
                    );
                    device
                        .format()
                        .context("read camera format after set failure")?
                }
            };

            self.format = match &format.fourcc.repr {
                b"RGB3" => PixelFormat::Rgb24,
                b"YUYV" => PixelFormat::Yuyv,
                other => {
                    return Err(anyhow::anyhow!(
                        "camera {} negotiated unsupported pixel format {}",
                        self.config.device,
                        String::from_utf8_lossy(other)
                    ))
                }
            };

            if self.config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "CameraSource: failed to set fps on {}: {}",
                        self.config.device,
                        err
                    );
                }
            }

            self.active_width = format.width;
            self.active_height = format.height;

            let state = DeviceStateTryBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create camera stream"))
                },
            }
            .try_build()?;
            self.state = Some(state);

            log::info!(
                "CameraSource: connected to {} ({}x{}, {:?})",
                self.config.device,
                self.active_width,
                self.active_height,
                self.format
            );
            Ok(())
        }

        pub(super) fn disconnect(&mut self) {
            if self.state.take().is_some() {
                log::info!("CameraSource: released {}", self.config.device);
            }
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("camera not connected")?;
            let (buf, _meta) = state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| anyhow::Error::new(err).context("capture camera frame"))?;

            let pixels =
                normalize_to_rgb(buf, self.active_width, self.active_height, self.format)?;
            self.frame_count += 1;
            Frame::new(
                pixels,
                self.active_width,
                self.active_height,
                self.frame_count,
            )
        }

        pub(super) fn stats(&self) -> CameraStats {
            CameraStats {
                frames_captured: self.frame_count,
                device: self.config.device.clone(),
                width: self.active_width,
                height: self.active_height,
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            target_fps: 30,
            frame_limit: None,
        }
    }

    #[test]
    fn camera_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.byte_len(), 64 * 48 * 3);
        Ok(())
    }

    #[test]
    fn camera_requires_connect() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn frame_limit_reports_end_of_stream() -> Result<()> {
        let mut source = CameraSource::new(CameraConfig {
            frame_limit: Some(2),
            ..stub_config()
        })?;
        source.connect()?;

        source.produce()?;
        source.produce()?;
        let err = source.produce().unwrap_err();
        assert!(err.to_string().contains("end of stream"));
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn release_disconnects() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;
        assert!(source.is_connected());
        source.release()?;
        assert!(!source.is_connected());
        assert_eq!(source.name(), "stub://test");
        Ok(())
    }

    #[test]
    fn rejects_zero_resolution() {
        let result = CameraSource::new(CameraConfig {
            width: 0,
            ..stub_config()
        });
        assert!(result.is_err());
    }

    #[test]
    fn numeric_id_maps_to_device_node() {
        assert_eq!(device_path_for_id(2), "/dev/video2");
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_device_requires_feature() {
        let result = CameraSource::new(CameraConfig {
            device: "/dev/video0".to_string(),
            ..stub_config()
        });
        assert!(result.is_err());
    }
}
