//! PNG output for painted frames.
//!
//! `annotate` writes every annotated frame to a directory; the live display
//! writes its last painted frame on close.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

/// `frame_000042.png` for sequence 42.
pub fn frame_file_name(sequence: u64) -> String {
    format!("frame_{:06}.png", sequence)
}

pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .ok_or_else(|| anyhow!("frame #{} does not fit its dimensions", frame.sequence))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("write frame {}", path.display()))
}

/// Write each frame as `<dir>/frame_<sequence>.png`, creating `dir` if needed.
pub fn write_frames(frames: &[Frame], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create frame directory {}", dir.display()))?;
    frames
        .iter()
        .map(|frame| {
            let path = dir.join(frame_file_name(frame.sequence));
            save_png(frame, &path)?;
            Ok(path)
        })
        .collect()
}
