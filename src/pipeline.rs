//! Orchestrator: wires one primary source and N auxiliary sources to a sink.
//!
//! `Pipeline::run`:
//! 1. validates the source count (before any thread exists)
//! 2. creates one `LatestSlot` per source and spawns one worker per source
//! 3. runs the fusion consumer on the calling thread
//! 4. raises shutdown, joins every worker, then releases sources and sink
//!
//! Sources are only released after their worker has been joined, on every
//! exit path.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::fusion::{ConsumerStats, FusionConsumer, Sink};
use crate::shutdown::{ShutdownSignal, StopReason};
use crate::slot::LatestSlot;
use crate::source::Source;
use crate::worker::{SourceWorker, SpawnFailure, WorkerHandle, WorkerStats};

/// Upper bound on auxiliary sources per pipeline.
pub const MAX_AUX_SOURCES: usize = 8;

type AuxSource<A> = Box<dyn Source<Sample = A>>;

#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub reason: Option<StopReason>,
    pub consumer: ConsumerStats,
    /// Primary first, then auxiliaries in registration order. Workers that
    /// panicked are absent.
    pub workers: Vec<WorkerStats>,
}

pub struct Pipeline<P: Source, A> {
    primary: P,
    auxiliary: Vec<AuxSource<A>>,
    shutdown: ShutdownSignal,
    min_interval: Duration,
    initial: Option<A>,
    worker_stack_size: Option<usize>,
}

impl<P, A> Pipeline<P, A>
where
    P: Source + 'static,
    A: Clone + Send + 'static,
{
    pub fn new(primary: P, shutdown: ShutdownSignal) -> Self {
        Self {
            primary,
            auxiliary: Vec::new(),
            shutdown,
            min_interval: Duration::ZERO,
            initial: None,
            worker_stack_size: None,
        }
    }

    pub fn with_auxiliary(mut self, source: impl Source<Sample = A> + 'static) -> Self {
        self.auxiliary.push(Box::new(source));
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_initial(mut self, initial: A) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Stack size for every worker thread.
    pub fn with_worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = Some(bytes);
        self
    }

    pub fn auxiliary_count(&self) -> usize {
        self.auxiliary.len()
    }

    fn validate(&self) -> Result<()> {
        if self.auxiliary.is_empty() {
            return Err(anyhow!("pipeline needs at least one auxiliary source"));
        }
        if self.auxiliary.len() > MAX_AUX_SOURCES {
            return Err(anyhow!(
                "pipeline supports at most {} auxiliary sources, got {}",
                MAX_AUX_SOURCES,
                self.auxiliary.len()
            ));
        }
        Ok(())
    }

    /// Run until shutdown. Blocks the calling thread, which drives the sink.
    pub fn run<K: Sink<P::Sample, A> + ?Sized>(self, sink: &mut K) -> Result<PipelineReport> {
        self.validate()?;
        let Pipeline {
            primary,
            auxiliary,
            shutdown,
            min_interval,
            initial,
            worker_stack_size,
        } = self;

        log::info!(
            "pipeline starting: primary={} auxiliary={}",
            primary.name(),
            auxiliary.len()
        );

        let primary_slot = Arc::new(LatestSlot::new());
        let aux_slots: Vec<Arc<LatestSlot<A>>> = auxiliary
            .iter()
            .map(|_| Arc::new(LatestSlot::new()))
            .collect();

        let mut workers = Workers::new(worker_stack_size);
        if let Err(err) = workers.start(
            primary,
            primary_slot.clone(),
            auxiliary,
            &aux_slots,
            &shutdown,
        ) {
            shutdown.set(StopReason::SourceFault {
                source: "pipeline".to_string(),
                message: format!("{:#}", err),
            });
            let _ = workers.join_and_release();
            close_sink::<P::Sample, A, K>(sink);
            return Err(err);
        }

        let mut consumer = FusionConsumer::new(primary_slot, aux_slots, shutdown.clone())
            .with_min_interval(min_interval);
        if let Some(initial) = initial {
            consumer = consumer.with_initial(initial);
        }
        let consumer_stats = consumer.run(sink);

        shutdown.set(StopReason::Completed);
        let reason = shutdown.reason();
        match &reason {
            Some(reason) if reason.is_fault() => log::error!("pipeline stopping: {}", reason),
            Some(reason) => log::info!("pipeline stopping: {}", reason),
            None => {}
        }

        let worker_stats = workers.join_and_release();
        close_sink::<P::Sample, A, K>(sink);

        log::info!(
            "pipeline stopped after {} iterations",
            consumer_stats.iterations
        );
        Ok(PipelineReport {
            reason,
            consumer: consumer_stats,
            workers: worker_stats,
        })
    }
}

fn close_sink<P, A, K: Sink<P, A> + ?Sized>(sink: &mut K) {
    if let Err(err) = sink.close() {
        log::warn!("sink close failed: {:#}", err);
    }
}

/// Running workers, split by source type.
struct Workers<P, A> {
    primary: Option<WorkerHandle<P>>,
    auxiliary: Vec<WorkerHandle<AuxSource<A>>>,
    stack_size: Option<usize>,
}

impl<P, A> Workers<P, A>
where
    P: Source + 'static,
    A: Send + 'static,
{
    fn new(stack_size: Option<usize>) -> Self {
        Self {
            primary: None,
            auxiliary: Vec::new(),
            stack_size,
        }
    }

    /// Spawn the primary, then each auxiliary. On the first failure the
    /// failed source and every not-yet-spawned source are released.
    fn start(
        &mut self,
        primary: P,
        primary_slot: Arc<LatestSlot<P::Sample>>,
        auxiliary: Vec<AuxSource<A>>,
        aux_slots: &[Arc<LatestSlot<A>>],
        shutdown: &ShutdownSignal,
    ) -> Result<()> {
        let mut pending = auxiliary.into_iter().zip(aux_slots);

        let primary = SourceWorker::new(primary, primary_slot, shutdown.clone())
            .with_stack_size(self.stack_size);
        match primary.spawn() {
            Ok(handle) => self.primary = Some(handle),
            Err(failure) => return Err(abandon(failure, pending.map(|(source, _)| source))),
        }

        while let Some((source, slot)) = pending.next() {
            let worker = SourceWorker::new(source, slot.clone(), shutdown.clone())
                .with_stack_size(self.stack_size);
            match worker.spawn() {
                Ok(handle) => self.auxiliary.push(handle),
                Err(failure) => return Err(abandon(failure, pending.map(|(source, _)| source))),
            }
        }
        Ok(())
    }

    /// Join every worker first, then release every returned source.
    fn join_and_release(self) -> Vec<WorkerStats> {
        let mut stats = Vec::new();
        let mut primary_source = None;
        let mut aux_sources = Vec::new();

        if let Some(handle) = self.primary {
            match handle.join() {
                Ok((source, worker_stats)) => {
                    primary_source = Some(source);
                    stats.push(worker_stats);
                }
                Err(err) => log::error!("{:#}", err),
            }
        }
        for handle in self.auxiliary {
            match handle.join() {
                Ok((source, worker_stats)) => {
                    aux_sources.push(source);
                    stats.push(worker_stats);
                }
                Err(err) => log::error!("{:#}", err),
            }
        }

        if let Some(mut source) = primary_source {
            release(&mut source);
        }
        for mut source in aux_sources {
            release(&mut source);
        }
        stats
    }
}

/// Release the source of a failed spawn and every source that never started.
fn abandon<S, R>(failure: SpawnFailure<S>, unstarted: impl Iterator<Item = R>) -> anyhow::Error
where
    S: Source,
    R: Source,
{
    let SpawnFailure { source, error } = failure;
    if let Some(mut source) = source {
        release(&mut source);
    }
    for mut source in unstarted {
        release(&mut source);
    }
    error
}

fn release<S: Source + ?Sized>(source: &mut S) {
    if let Err(err) = source.release() {
        log::warn!("release of source '{}' failed: {:#}", source.name(), err);
    }
}
