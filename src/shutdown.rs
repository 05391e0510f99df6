//! Cooperative, one-shot cancellation shared by every loop in a pipeline.
//!
//! A `ShutdownSignal` is a cheap cloneable handle. Each worker and the
//! fusion consumer receive a clone at construction time and poll it between
//! units of work. The signal is set at most once; the first caller's
//! `StopReason` is kept and later calls are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Why a pipeline stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A source's `produce()` failed (device error, end of stream, panic).
    SourceFault { source: String, message: String },
    /// The sink failed to render a snapshot.
    SinkFault { message: String },
    /// The sink asked to stop (e.g. quit key, frame limit reached).
    UserTermination,
    /// Process interrupt (Ctrl-C).
    Interrupted,
    /// The consumer returned and the orchestrator is winding down.
    Completed,
}

impl StopReason {
    /// True for reasons that represent a failure rather than a request.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            StopReason::SourceFault { .. } | StopReason::SinkFault { .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::SourceFault { source, message } => {
                write!(f, "source '{}' faulted: {}", source, message)
            }
            StopReason::SinkFault { message } => write!(f, "sink faulted: {}", message),
            StopReason::UserTermination => write!(f, "user requested stop"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    reason: OnceLock<StopReason>,
}

/// Shared shutdown flag. Clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that set it.
    ///
    /// The reason is recorded before the flag becomes visible, so any thread
    /// that observes `is_set() == true` also observes `reason() == Some(_)`.
    pub fn set(&self, reason: StopReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        self.inner.flag.store(true, Ordering::SeqCst);
        first
    }

    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// The reason recorded by the first `set`.
    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.get().cloned()
    }
}
