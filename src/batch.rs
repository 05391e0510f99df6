//! Offline annotation of a recorded frame sequence.
//!
//! Frames are read up front, split into disjoint contiguous ranges and each
//! range is processed by its own scoped thread with its own detector
//! instance. Threads share nothing mutable: each owns its `&mut [Frame]`.

use anyhow::{anyhow, Result};
use std::ops::Range;
use std::thread;
use std::time::Instant;

use crate::detect::{DetectionResult, DetectorBackend};
use crate::frame::Frame;
use crate::overlay::draw_detections;
use crate::source::Source;

/// Split `0..len` into at most `parts` contiguous, non-empty ranges whose
/// sizes differ by at most one.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1).min(len);
    if parts == 0 {
        return Vec::new();
    }
    let base = len / parts;
    let extra = len % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Read frames until the source ends or `limit` frames were collected.
///
/// End of stream is the normal way out and is not an error.
pub fn collect_frames<S: Source<Sample = Frame> + ?Sized>(
    source: &mut S,
    limit: usize,
) -> Vec<Frame> {
    let mut frames = Vec::new();
    while frames.len() < limit {
        match source.produce() {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                log::info!(
                    "{}: stopped reading after {} frames: {:#}",
                    source.name(),
                    frames.len(),
                    err
                );
                break;
            }
        }
    }
    frames
}

/// Detect on every frame using `workers` threads and draw the boxes in place.
///
/// Results come back in frame order. `workers == 1` runs a single thread.
pub fn annotate_parallel<F>(
    frames: &mut [Frame],
    workers: usize,
    make_backend: F,
) -> Result<Vec<DetectionResult>>
where
    F: Fn() -> Result<Box<dyn DetectorBackend>> + Sync,
{
    let ranges = partition(frames.len(), workers);
    let started = Instant::now();

    let mut chunks = Vec::with_capacity(ranges.len());
    let mut rest = frames;
    for range in &ranges {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        chunks.push((range.start, head));
        rest = tail;
    }

    let make_backend = &make_backend;
    let per_chunk: Vec<Result<Vec<DetectionResult>>> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|(offset, chunk)| {
                scope.spawn(move || annotate_chunk(offset, chunk, make_backend))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("annotation thread panicked"))?
            })
            .collect()
    });

    let mut results = Vec::with_capacity(ranges.iter().map(|r| r.len()).sum());
    for chunk in per_chunk {
        results.extend(chunk?);
    }
    log::info!(
        "annotated {} frames on {} thread(s) in {:.3}s",
        results.len(),
        ranges.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(results)
}

fn annotate_chunk<F>(
    offset: usize,
    chunk: &mut [Frame],
    make_backend: &F,
) -> Result<Vec<DetectionResult>>
where
    F: Fn() -> Result<Box<dyn DetectorBackend>>,
{
    let mut backend = make_backend()?;
    backend.warm_up()?;
    log::debug!(
        "{}: frames {}..{}",
        backend.name(),
        offset,
        offset + chunk.len()
    );

    let mut results = Vec::with_capacity(chunk.len());
    for (i, frame) in chunk.iter_mut().enumerate() {
        let result = backend
            .detect(frame.pixels(), frame.width, frame.height)
            .map_err(|e| anyhow!("frame {}: {:#}", offset + i, e))?;
        draw_detections(frame, &result);
        results.push(result);
    }
    Ok(results)
}
