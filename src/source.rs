//! The "produce one sample" capability every worker drives.
//!
//! A `Source` is anything that can block for a while and hand back a value.
//! Errors from `produce` are unrecoverable: the worker raises the shutdown
//! signal and exits. `release` is called once by the orchestrator after the
//! worker thread has been joined.

use anyhow::Result;
use std::thread;
use std::time::Duration;

pub trait Source: Send {
    type Sample: Send + 'static;

    /// Identifier used in thread names, logs and stop reasons.
    fn name(&self) -> &str;

    /// Produce the next sample. May block (pacing delay, device read).
    fn produce(&mut self) -> Result<Self::Sample>;

    /// Release any external resource held by the source.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    type Sample = S::Sample;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn produce(&mut self) -> Result<Self::Sample> {
        (**self).produce()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

/// Synthetic sensor: waits `interval`, then returns an incrementing counter.
///
/// The first sample is 1.
#[derive(Clone, Debug)]
pub struct CounterSource {
    name: String,
    interval: Duration,
    value: u64,
}

impl CounterSource {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            value: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Source for CounterSource {
    type Sample = u64;

    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&mut self) -> Result<u64> {
        thread::sleep(self.interval);
        self.value += 1;
        Ok(self.value)
    }
}
