//! Sampling loop that drives one `Source` into its `LatestSlot`.
//!
//! The loop is `check shutdown -> produce -> publish` with no coordination
//! with the consumer; publish rate is set entirely by the source. A failing
//! (or panicking) `produce` raises the shared shutdown signal and ends the
//! loop without publishing.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::shutdown::{ShutdownSignal, StopReason};
use crate::slot::LatestSlot;
use crate::source::Source;

/// Counters reported by a finished worker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub source: String,
    /// Samples handed to the slot.
    pub published: u64,
    /// Publishes that replaced a value the consumer never read.
    pub overwritten: u64,
    /// True when the loop ended because `produce` failed.
    pub faulted: bool,
}

pub struct SourceWorker<S: Source> {
    source: S,
    slot: Arc<LatestSlot<S::Sample>>,
    shutdown: ShutdownSignal,
    stack_size: Option<usize>,
}

/// A worker thread that could not be started.
pub struct SpawnFailure<S> {
    /// The never-run source, handed back so the caller can release it.
    /// `None` only if the thread took it before the spawn failed.
    pub source: Option<S>,
    pub error: anyhow::Error,
}

impl<S: Source + 'static> SourceWorker<S> {
    pub fn new(source: S, slot: Arc<LatestSlot<S::Sample>>, shutdown: ShutdownSignal) -> Self {
        Self {
            source,
            slot,
            shutdown,
            stack_size: None,
        }
    }

    /// Stack size of the spawned thread; the platform default when unset.
    pub fn with_stack_size(mut self, stack_size: Option<usize>) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Run the sampling loop on the current thread until shutdown or fault.
    ///
    /// Hands the source back so the caller can release it.
    pub fn run(mut self) -> (S, WorkerStats) {
        let mut stats = WorkerStats {
            source: self.source.name().to_string(),
            ..WorkerStats::default()
        };
        let guard = PanicGuard {
            source: stats.source.clone(),
            shutdown: self.shutdown.clone(),
        };

        log::debug!("worker {}: started", stats.source);
        while !self.shutdown.is_set() {
            match self.source.produce() {
                Ok(sample) => {
                    if self.slot.publish(sample) {
                        stats.overwritten += 1;
                    }
                    stats.published += 1;
                }
                Err(err) => {
                    log::error!("worker {}: source fault: {:#}", stats.source, err);
                    self.shutdown.set(StopReason::SourceFault {
                        source: stats.source.clone(),
                        message: format!("{:#}", err),
                    });
                    stats.faulted = true;
                    break;
                }
            }
        }
        drop(guard);

        log::debug!(
            "worker {}: stopped after {} samples ({} overwritten)",
            stats.source,
            stats.published,
            stats.overwritten
        );
        (self.source, stats)
    }

    /// Start the loop on a dedicated thread named `source-<name>`.
    pub fn spawn(self) -> std::result::Result<WorkerHandle<S>, SpawnFailure<S>> {
        let name = self.source.name().to_string();
        let mut builder = thread::Builder::new().name(format!("source-{}", name));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // The worker is parked outside the closure so a failed spawn can
        // return its source instead of dropping it.
        let parked = Arc::new(Mutex::new(Some(self)));
        let handoff = parked.clone();
        let spawned = builder.spawn(move || {
            let worker = handoff
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            worker.map(SourceWorker::run)
        });

        match spawned {
            Ok(join) => Ok(WorkerHandle { name, join }),
            Err(err) => {
                let worker = parked
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                Err(SpawnFailure {
                    source: worker.map(|worker| worker.source),
                    error: anyhow!("failed to spawn worker for source '{}': {}", name, err),
                })
            }
        }
    }
}

/// Raises the shutdown signal if the sampling loop unwinds.
struct PanicGuard {
    source: String,
    shutdown: ShutdownSignal,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shutdown.set(StopReason::SourceFault {
                source: self.source.clone(),
                message: "worker panicked".to_string(),
            });
        }
    }
}

pub struct WorkerHandle<S> {
    name: String,
    join: JoinHandle<Option<(S, WorkerStats)>>,
}

impl<S> WorkerHandle<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker thread and take back its source.
    pub fn join(self) -> Result<(S, WorkerStats)> {
        self.join
            .join()
            .map_err(|_| anyhow!("worker for source '{}' panicked", self.name))?
            .ok_or_else(|| {
                anyhow!("worker for source '{}' started without its source", self.name)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CounterSource;
    use std::time::{Duration, Instant};

    struct FailingSource {
        calls: u32,
        fail_on: u32,
    }

    impl Source for FailingSource {
        type Sample = u32;

        fn name(&self) -> &str {
            "failing"
        }

        fn produce(&mut self) -> Result<u32> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(anyhow!("device unreadable"));
            }
            Ok(self.calls)
        }
    }

    struct PanickingSource;

    impl Source for PanickingSource {
        type Sample = u8;

        fn name(&self) -> &str {
            "panicky"
        }

        fn produce(&mut self) -> Result<u8> {
            panic!("driver bug");
        }
    }

    #[test]
    fn fault_sets_shutdown_without_publishing() {
        let slot = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();
        let worker = SourceWorker::new(
            FailingSource {
                calls: 0,
                fail_on: 3,
            },
            slot.clone(),
            shutdown.clone(),
        );

        let (source, stats) = worker.run();

        assert_eq!(source.calls, 3);
        assert!(stats.faulted);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.overwritten, 1);
        assert_eq!(slot.try_take(), Some(2));
        assert_eq!(
            shutdown.reason(),
            Some(StopReason::SourceFault {
                source: "failing".to_string(),
                message: "device unreadable".to_string(),
            })
        );
    }

    #[test]
    fn does_not_produce_after_shutdown() {
        let slot = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();
        shutdown.set(StopReason::Interrupted);

        let worker = SourceWorker::new(
            FailingSource {
                calls: 0,
                fail_on: 1,
            },
            slot.clone(),
            shutdown,
        );
        let (source, stats) = worker.run();

        assert_eq!(source.calls, 0);
        assert_eq!(stats.published, 0);
        assert!(!stats.faulted);
        assert!(slot.is_empty());
    }

    #[test]
    fn spawned_worker_stops_within_one_interval() -> Result<()> {
        let slot = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();
        let handle = SourceWorker::new(
            CounterSource::new("s1", Duration::from_millis(10)),
            slot.clone(),
            shutdown.clone(),
        )
        .spawn()
        .map_err(|failure| failure.error)?;
        assert_eq!(handle.name(), "s1");

        thread::sleep(Duration::from_millis(100));
        shutdown.set(StopReason::Completed);
        let stopped_at = Instant::now();
        let (_, stats) = handle.join()?;

        assert!(stopped_at.elapsed() < Duration::from_millis(500));
        assert!(stats.published >= 3, "published {}", stats.published);
        assert!(!stats.faulted);
        Ok(())
    }

    #[test]
    fn panicking_source_raises_shutdown() -> Result<()> {
        let slot = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();
        let handle = SourceWorker::new(PanickingSource, slot, shutdown.clone())
            .spawn()
            .map_err(|failure| failure.error)?;

        assert!(handle.join().is_err());
        assert!(shutdown.is_set());
        assert!(shutdown.reason().unwrap().is_fault());
        Ok(())
    }

    #[test]
    fn failed_spawn_hands_the_source_back() {
        let slot = Arc::new(LatestSlot::new());
        let shutdown = ShutdownSignal::new();
        let result = SourceWorker::new(
            CounterSource::new("s1", Duration::from_millis(1)),
            slot.clone(),
            shutdown.clone(),
        )
        .with_stack_size(Some(usize::MAX / 2))
        .spawn();

        let failure = match result {
            Ok(_) => panic!("spawn with an unmappable stack succeeded"),
            Err(failure) => failure,
        };
        let source = failure.source.expect("source returned");
        assert_eq!(source.name(), "s1");
        assert!(failure.error.to_string().contains("failed to spawn worker"));
        assert!(slot.is_empty());
        assert!(!shutdown.is_set());
    }
}
