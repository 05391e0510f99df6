//! Fusion consumer: one primary value per iteration plus the latest known
//! value of every auxiliary source.
//!
//! Per iteration the consumer:
//! 1. blocks on the primary slot (returns early once shutdown is set)
//! 2. `try_take`s every auxiliary slot, keeping the cached value when empty
//! 3. hands a `FusedSnapshot` to the sink
//! 4. sleeps out the remainder of the minimum iteration period
//!
//! The sink may ask to stop; the consumer then raises the shutdown signal
//! itself and renders nothing further.

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::shutdown::{ShutdownSignal, StopReason};
use crate::slot::LatestSlot;

/// What the sink wants after rendering a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    Continue,
    RequestStop,
}

/// Primary value paired with the latest known value of each auxiliary source.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedSnapshot<P, A> {
    /// 1-based iteration counter.
    pub iteration: u64,
    pub primary: P,
    /// One entry per auxiliary source, in registration order.
    /// `None` until that source has published at least once (unless seeded).
    pub auxiliary: Vec<Option<A>>,
}

/// Consumer of fused snapshots (display, recorder, test probe).
pub trait Sink<P, A> {
    fn render(&mut self, snapshot: FusedSnapshot<P, A>) -> Result<UserAction>;

    /// Release display resources. Called once after all workers are joined.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Snapshots handed to the sink.
    pub iterations: u64,
}

pub struct FusionConsumer<P, A> {
    primary: Arc<LatestSlot<P>>,
    auxiliary: Vec<Arc<LatestSlot<A>>>,
    cache: Vec<Option<A>>,
    min_interval: Duration,
    shutdown: ShutdownSignal,
    iteration: u64,
}

impl<P, A: Clone> FusionConsumer<P, A> {
    pub fn new(
        primary: Arc<LatestSlot<P>>,
        auxiliary: Vec<Arc<LatestSlot<A>>>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let cache = vec![None; auxiliary.len()];
        Self {
            primary,
            auxiliary,
            cache,
            min_interval: Duration::ZERO,
            shutdown,
            iteration: 0,
        }
    }

    /// Minimum wall time per iteration; caps the sink update rate.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Seed every auxiliary entry with `initial` so snapshots never carry `None`.
    pub fn with_initial(mut self, initial: A) -> Self {
        for cached in &mut self.cache {
            *cached = Some(initial.clone());
        }
        self
    }

    /// Refresh the cache from every auxiliary slot without blocking.
    ///
    /// An empty slot keeps its last known good value.
    pub fn poll_auxiliary(&mut self) -> Vec<Option<A>> {
        for (slot, cached) in self.auxiliary.iter().zip(self.cache.iter_mut()) {
            if let Some(value) = slot.try_take() {
                *cached = Some(value);
            }
        }
        self.cache.clone()
    }

    /// Wait for the next primary value and fuse it with the auxiliary cache.
    ///
    /// Returns `None` once shutdown is observed.
    pub fn next_snapshot(&mut self) -> Option<FusedSnapshot<P, A>> {
        let primary = self.primary.take_until(&self.shutdown)?;
        let auxiliary = self.poll_auxiliary();
        self.iteration += 1;
        Some(FusedSnapshot {
            iteration: self.iteration,
            primary,
            auxiliary,
        })
    }

    /// Drive `sink` until shutdown, a stop request, or a sink error.
    pub fn run<K: Sink<P, A> + ?Sized>(&mut self, sink: &mut K) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        loop {
            let started = Instant::now();
            if self.shutdown.is_set() {
                break;
            }
            let Some(snapshot) = self.next_snapshot() else {
                break;
            };
            let iteration = snapshot.iteration;

            match sink.render(snapshot) {
                Ok(UserAction::Continue) => {
                    stats.iterations += 1;
                }
                Ok(UserAction::RequestStop) => {
                    stats.iterations += 1;
                    log::info!("sink requested stop at iteration {}", iteration);
                    self.shutdown.set(StopReason::UserTermination);
                    break;
                }
                Err(err) => {
                    log::error!("sink failed at iteration {}: {:#}", iteration, err);
                    self.shutdown.set(StopReason::SinkFault {
                        message: format!("{:#}", err),
                    });
                    break;
                }
            }

            let elapsed = started.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        stats
    }
}
