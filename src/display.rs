//! Display sink for the live fusion loop.
//!
//! Paints the status bar on each frame, shows the fused sensor values on the
//! terminal status line, and asks the pipeline to stop once an optional frame
//! budget is spent (the headless counterpart of a quit key). The most recent
//! painted frame is kept and, when a snapshot path is set, written as PNG on
//! close.

use anyhow::Result;
use std::fmt::Display;
use std::path::PathBuf;

use crate::export::save_png;
use crate::frame::Frame;
use crate::fusion::{FusedSnapshot, Sink, UserAction};
use crate::overlay::{draw_status_bar, status_text};
use crate::ui::StatusLine;

pub struct DisplaySink {
    labels: Vec<String>,
    status: StatusLine,
    max_frames: Option<u64>,
    snapshot: Option<PathBuf>,
    rendered: u64,
    last_text: String,
    last_frame: Option<Frame>,
}

impl DisplaySink {
    pub fn new(labels: Vec<String>, status: StatusLine) -> Self {
        Self {
            labels,
            status,
            max_frames: None,
            snapshot: None,
            rendered: 0,
            last_text: String::new(),
            last_frame: None,
        }
    }

    /// Request a stop after `max_frames` renders.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Write the last painted frame to `path` when the sink closes.
    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot = path;
        self
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    /// Status text of the most recent render.
    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }
}

impl<A: Display> Sink<Frame, A> for DisplaySink {
    fn render(&mut self, snapshot: FusedSnapshot<Frame, A>) -> Result<UserAction> {
        let mut frame = snapshot.primary;
        draw_status_bar(&mut frame);

        self.last_text = status_text(&self.labels, &snapshot.auxiliary);
        self.status.update(&self.last_text);
        self.rendered += 1;
        log::trace!(
            "frame #{} ({}x{}, age {:?}): {}",
            frame.sequence,
            frame.width,
            frame.height,
            frame.age(),
            self.last_text
        );
        self.last_frame = Some(frame);

        match self.max_frames {
            Some(max) if self.rendered >= max => Ok(UserAction::RequestStop),
            _ => Ok(UserAction::Continue),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.status.finish();
        log::info!("display closed after {} frames", self.rendered);
        if let (Some(path), Some(frame)) = (&self.snapshot, &self.last_frame) {
            save_png(frame, path)?;
            log::info!("last frame #{} written to {}", frame.sequence, path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{default_labels, WHITE};
    use crate::ui::Ui;

    fn sink(max_frames: Option<u64>) -> DisplaySink {
        let ui = Ui::from_args(Some("plain"), false, true);
        DisplaySink::new(default_labels(2), ui.status_line("test")).with_max_frames(max_frames)
    }

    fn snapshot(iteration: u64, aux: Vec<Option<u64>>) -> Result<FusedSnapshot<Frame, u64>> {
        Ok(FusedSnapshot {
            iteration,
            primary: Frame::solid(16, 16, [0, 0, 0])?,
            auxiliary: aux,
        })
    }

    #[test]
    fn renders_status_text() -> Result<()> {
        let mut display = sink(None);
        let action = display.render(snapshot(1, vec![Some(4), None])?)?;
        assert_eq!(action, UserAction::Continue);
        assert_eq!(display.last_text(), "Sensor_1 = 4, Sensor_2 = -");
        assert_eq!(display.rendered(), 1);
        Ok(())
    }

    #[test]
    fn keeps_painted_frame_and_writes_snapshot() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("last.png");
        let mut display = sink(None).with_snapshot(Some(path.clone()));
        assert!(display.last_frame().is_none());

        let frame = Frame::new(vec![0; 600 * 40 * 3], 600, 40, 9)?;
        display.render(FusedSnapshot {
            iteration: 1,
            primary: frame,
            auxiliary: vec![Some(1), Some(2)],
        })?;
        let kept = display.last_frame().map(|f| f.sequence);
        assert_eq!(kept, Some(9));
        Sink::<Frame, u64>::close(&mut display)?;

        // The status bar occupies the bottom-right 480x25.
        let decoded = image::open(&path)?.to_rgb8();
        assert_eq!(decoded.get_pixel(599, 39).0, WHITE);
        assert_eq!(decoded.get_pixel(120, 15).0, WHITE);
        assert_eq!(decoded.get_pixel(119, 39).0, [0, 0, 0]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn close_without_frames_writes_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("last.png");
        let mut display = sink(None).with_snapshot(Some(path.clone()));
        Sink::<Frame, u64>::close(&mut display)?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn requests_stop_at_frame_budget() -> Result<()> {
        let mut display = sink(Some(2));
        assert_eq!(
            display.render(snapshot(1, vec![Some(1), Some(1)])?)?,
            UserAction::Continue
        );
        assert_eq!(
            display.render(snapshot(2, vec![Some(2), Some(1)])?)?,
            UserAction::RequestStop
        );
        Sink::<Frame, u64>::close(&mut display)?;
        Ok(())
    }
}
