//! Frame ingestion sources.
//!
//! This module provides the primary source for the fusion pipeline:
//! - Local camera devices (feature: ingest-v4l2)
//! - Stub camera (`stub://`, testing and hardware-free runs)
//!
//! All sources produce RGB24 `Frame` instances that flow into the primary slot.
//! The ingestion layer is responsible for:
//! - Negotiating resolution with the device
//! - Normalizing device pixel formats to RGB24
//! - Surfacing end-of-stream and device errors to the worker as faults

pub mod camera;
#[cfg(feature = "ingest-v4l2")]
mod normalize;

pub use camera::{device_path_for_id, CameraConfig, CameraSource, CameraStats};
