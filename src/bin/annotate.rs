//! annotate - offline detection over a recorded frame sequence
//!
//! Reads up to `--frames` frames from a camera or stub clip, runs the selected
//! detector over disjoint frame ranges (one thread per range in multi mode),
//! draws the boxes and writes one JSON line per frame. With `--frames-dir` the
//! annotated frames are written there as PNG files.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Instant;

use sensor_fusion::batch::{annotate_parallel, collect_frames};
use sensor_fusion::detect::{self, DetectionResult};
use sensor_fusion::export::write_frames;
use sensor_fusion::ui::Ui;
use sensor_fusion::{CameraConfig, CameraSource, Source};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Single,
    Multi,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: device path or stub://<name>.
    #[arg(long, default_value = "stub://clip")]
    source: String,
    /// Maximum frames to read (stub clips end here).
    #[arg(long, default_value_t = 300)]
    frames: usize,
    /// Execution mode.
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,
    /// Threads used in multi mode.
    #[arg(long, default_value_t = 3)]
    workers: usize,
    /// Detector backend.
    #[arg(long, default_value = "luma")]
    backend: String,
    /// Output file (JSON lines).
    #[arg(long, default_value = "annotations.jsonl")]
    out: PathBuf,
    /// Directory for annotated frames (PNG, one file per frame).
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

#[derive(Serialize)]
struct FrameAnnotation<'a> {
    frame: u64,
    #[serde(flatten)]
    result: &'a DetectionResult,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }
    if args.workers == 0 {
        return Err(anyhow!("workers must be >= 1"));
    }
    // Fail on a bad backend name before reading any frames.
    detect::by_name(&args.backend)?;

    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);

    let mut frames = {
        let _stage = ui.stage("read frames");
        let mut source = CameraSource::new(CameraConfig {
            device: args.source.clone(),
            width: args.width,
            height: args.height,
            target_fps: 0,
            frame_limit: Some(args.frames as u64),
        })?;
        source.connect()?;
        let frames = collect_frames(&mut source, args.frames);
        source.release()?;
        frames
    };
    if frames.is_empty() {
        return Err(anyhow!("no frames read from {}", args.source));
    }

    let workers = match args.mode {
        Mode::Single => 1,
        Mode::Multi => args.workers,
    };
    let started = Instant::now();
    let results = {
        let _stage = ui.stage("annotate frames");
        annotate_parallel(&mut frames, workers, || detect::by_name(&args.backend))?
    };
    log::info!(
        "processing ended: {} frames, {} thread(s), {:.3}s",
        frames.len(),
        workers,
        started.elapsed().as_secs_f64()
    );

    {
        let _stage = ui.stage("write annotations");
        let file = File::create(&args.out)
            .with_context(|| format!("create output {}", args.out.display()))?;
        let mut out = BufWriter::new(file);
        for (frame, result) in frames.iter().zip(&results) {
            let line = serde_json::to_string(&FrameAnnotation {
                frame: frame.sequence,
                result,
            })?;
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
    }

    if let Some(dir) = &args.frames_dir {
        let _stage = ui.stage("write frames");
        let written = write_frames(&frames, dir)?;
        log::info!("wrote {} annotated frames to {}", written.len(), dir.display());
    }

    let hits = results.iter().filter(|r| r.motion_detected).count();
    log::info!(
        "wrote {} annotations ({} with detections) to {}",
        results.len(),
        hits,
        args.out.display()
    );
    Ok(())
}
