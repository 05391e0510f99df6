//! Detector seam used by the batch annotator.
//!
//! Inference itself is an external collaborator; the crate ships two cheap
//! CPU backends so the batch path runs end to end.

mod backend;
pub mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::{by_name, LumaBackend, StubBackend, BACKEND_NAMES};
pub use result::{Detection, DetectionResult, SizeClass};
