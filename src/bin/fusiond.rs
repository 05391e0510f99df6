//! fusiond - live sensor fusion loop
//!
//! This daemon:
//! 1. Opens the camera (or a stub camera) as the primary source
//! 2. Starts one sampling thread per sensor plus one for the camera
//! 3. Fuses the latest camera frame with the latest sensor values and shows them
//! 4. Stops on Ctrl-C, on `--frames`, or on any source fault, joining all
//!    threads before the camera is released

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use sensor_fusion::config::parse_seconds;
use sensor_fusion::ingest::device_path_for_id;
use sensor_fusion::overlay::default_labels;
use sensor_fusion::ui::Ui;
use sensor_fusion::{
    CameraSource, CounterSource, DisplaySink, FusionConfig, Pipeline, ShutdownSignal, StopReason,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera id, opened as /dev/video<ID>.
    #[arg(long)]
    cam_id: Option<u32>,
    /// Camera device path or stub://<name> (takes precedence over --cam-id).
    #[arg(long)]
    device: Option<String>,
    /// Requested frame width.
    #[arg(long)]
    width: Option<u32>,
    /// Requested frame height.
    #[arg(long)]
    height: Option<u32>,
    /// Minimum display period in seconds (never below 0.01).
    #[arg(long, value_parser = parse_seconds)]
    delay: Option<Duration>,
    /// Sensor delay in seconds; repeat once per sensor.
    #[arg(long = "sensor-delay", value_parser = parse_seconds)]
    sensor_delays: Vec<Duration>,
    /// Stop after this many displayed frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Write the last displayed frame (with status bar) to this PNG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut FusionConfig) {
        if let Some(id) = self.cam_id {
            cfg.camera.device = device_path_for_id(id);
        }
        if let Some(device) = &self.device {
            cfg.camera.device = device.clone();
        }
        if let Some(width) = self.width {
            cfg.camera.width = width;
        }
        if let Some(height) = self.height {
            cfg.camera.height = height;
        }
        if let Some(delay) = self.delay {
            cfg.display.delay = delay;
        }
        if !self.sensor_delays.is_empty() {
            cfg.set_sensor_delays(self.sensor_delays.clone());
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = FusionConfig::load()?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);

    let shutdown = ShutdownSignal::new();
    let interrupt = shutdown.clone();
    ctrlc::set_handler(move || {
        if interrupt.set(StopReason::Interrupted) {
            log::info!("interrupt received, shutting down");
        }
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut camera = CameraSource::new(cfg.camera_config())?;
    camera.connect()?;

    log::info!(
        "fusiond running. camera={} {}x{} display_delay={:?}",
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height,
        cfg.display.delay
    );
    for sensor in &cfg.sensors {
        log::info!("sensor {} every {:?}", sensor.name, sensor.delay);
    }

    let mut pipeline = Pipeline::new(camera, shutdown)
        .with_min_interval(cfg.display.delay)
        .with_initial(0u64);
    for sensor in &cfg.sensors {
        pipeline = pipeline.with_auxiliary(CounterSource::new(sensor.name.clone(), sensor.delay));
    }

    let mut display = DisplaySink::new(default_labels(cfg.sensors.len()), ui.status_line("fusion"))
        .with_max_frames(args.frames)
        .with_snapshot(args.snapshot.clone());
    let report = pipeline.run(&mut display)?;

    for worker in &report.workers {
        log::info!(
            "source {}: {} samples, {} overwritten{}",
            worker.source,
            worker.published,
            worker.overwritten,
            if worker.faulted { " (faulted)" } else { "" }
        );
    }

    match report.reason {
        Some(reason) if reason.is_fault() => Err(anyhow!("pipeline stopped: {}", reason)),
        _ => {
            log::info!("work is done ({} frames)", report.consumer.iterations);
            Ok(())
        }
    }
}
