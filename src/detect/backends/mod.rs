use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

pub mod luma;
pub mod stub;

pub use luma::LumaBackend;
pub use stub::StubBackend;

/// Names accepted by `by_name`.
pub const BACKEND_NAMES: &[&str] = &["stub", "luma"];

/// Construct a fresh backend instance by name.
pub fn by_name(name: &str) -> Result<Box<dyn DetectorBackend>> {
    match name {
        "stub" => Ok(Box::new(StubBackend::new())),
        "luma" => Ok(Box::new(LumaBackend::default())),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected one of: {})",
            other,
            BACKEND_NAMES.join(", ")
        )),
    }
}
