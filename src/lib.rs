//! Sensor fusion loop
//!
//! Samples several independent sources at their own rates and fuses their most
//! recent values into one display loop.
//!
//! # Architecture
//!
//! - Every source runs on its own thread (`SourceWorker`) and publishes into a
//!   single-capacity `LatestSlot`; a full slot is overwritten, never queued.
//! - One consumer (`FusionConsumer`) blocks on the primary (camera) slot and
//!   samples each auxiliary slot without blocking, reusing the last known
//!   value when a slot is empty.
//! - A shared `ShutdownSignal` stops everything. Any worker fault, a sink stop
//!   request, or Ctrl-C raises it; `Pipeline` joins all workers before any
//!   source or display resource is released.
//!
//! # Module Structure
//!
//! - `slot`, `shutdown`, `source`, `worker`, `fusion`, `pipeline`: the core
//! - `ingest`: camera sources (stub + V4L2)
//! - `display`, `overlay`, `ui`, `export`: the sink side
//! - `batch`, `detect`: offline frame annotation across disjoint partitions
//! - `config`: file + environment configuration

pub mod batch;
pub mod config;
pub mod detect;
pub mod display;
pub mod export;
pub mod frame;
pub mod fusion;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod shutdown;
pub mod slot;
pub mod source;
pub mod ui;
pub mod worker;

pub use config::FusionConfig;
pub use display::DisplaySink;
pub use frame::Frame;
pub use fusion::{ConsumerStats, FusedSnapshot, FusionConsumer, Sink, UserAction};
pub use ingest::{CameraConfig, CameraSource};
pub use pipeline::{Pipeline, PipelineReport, MAX_AUX_SOURCES};
pub use shutdown::{ShutdownSignal, StopReason};
pub use slot::LatestSlot;
pub use source::{CounterSource, Source};
pub use worker::{SourceWorker, SpawnFailure, WorkerHandle, WorkerStats};
