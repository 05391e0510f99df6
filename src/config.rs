use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ingest::CameraConfig;
use crate::pipeline::MAX_AUX_SOURCES;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_SENSOR_DELAYS_MS: [u64; 3] = [10, 100, 1000];

/// Display iterations are never paced faster than this.
pub const MIN_DISPLAY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Deserialize, Default)]
struct FusionConfigFile {
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
    sensors: Option<Vec<SensorConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SensorConfigFile {
    name: Option<String>,
    delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub camera: CameraSettings,
    pub display: DisplaySettings,
    pub sensors: Vec<SensorSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Minimum period of one display iteration.
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    pub name: String,
    pub delay: Duration,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                device: DEFAULT_CAMERA_DEVICE.to_string(),
                width: DEFAULT_CAMERA_WIDTH,
                height: DEFAULT_CAMERA_HEIGHT,
                target_fps: DEFAULT_CAMERA_FPS,
            },
            display: DisplaySettings {
                delay: MIN_DISPLAY_DELAY,
            },
            sensors: sensors_from_delays(
                DEFAULT_SENSOR_DELAYS_MS
                    .iter()
                    .map(|ms| Duration::from_millis(*ms)),
            ),
        }
    }
}

impl FusionConfig {
    /// File (`FUSION_CONFIG`), then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FUSION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FusionConfigFile) -> Self {
        let defaults = Self::default();
        let camera = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera.device.unwrap_or(defaults.camera.device),
            width: camera.width.unwrap_or(defaults.camera.width),
            height: camera.height.unwrap_or(defaults.camera.height),
            target_fps: camera.target_fps.unwrap_or(defaults.camera.target_fps),
        };
        let display = DisplaySettings {
            delay: file
                .display
                .and_then(|display| display.delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.display.delay),
        };
        let sensors = match file.sensors {
            Some(sensors) => sensors
                .into_iter()
                .enumerate()
                .map(|(i, sensor)| SensorSettings {
                    name: sensor.name.unwrap_or_else(|| sensor_name(i)),
                    delay: Duration::from_millis(sensor.delay_ms),
                })
                .collect(),
            None => defaults.sensors,
        };
        Self {
            camera,
            display,
            sensors,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("FUSION_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(width) = std::env::var("FUSION_CAMERA_WIDTH") {
            self.camera.width = width
                .parse()
                .map_err(|_| anyhow!("FUSION_CAMERA_WIDTH must be a positive integer"))?;
        }
        if let Ok(height) = std::env::var("FUSION_CAMERA_HEIGHT") {
            self.camera.height = height
                .parse()
                .map_err(|_| anyhow!("FUSION_CAMERA_HEIGHT must be a positive integer"))?;
        }
        if let Ok(delay) = std::env::var("FUSION_DISPLAY_DELAY_MS") {
            let ms: u64 = delay
                .parse()
                .map_err(|_| anyhow!("FUSION_DISPLAY_DELAY_MS must be an integer"))?;
            self.display.delay = Duration::from_millis(ms);
        }
        if let Ok(delays) = std::env::var("FUSION_SENSOR_DELAYS_MS") {
            let parsed = split_csv(&delays)
                .iter()
                .map(|entry| {
                    entry.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                        anyhow!("FUSION_SENSOR_DELAYS_MS entries must be integers, got '{}'", entry)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if !parsed.is_empty() {
                self.sensors = sensors_from_delays(parsed);
            }
        }
        Ok(())
    }

    /// Replace the sensor list with default-named sensors at `delays`.
    pub fn set_sensor_delays(&mut self, delays: Vec<Duration>) {
        self.sensors = sensors_from_delays(delays);
    }

    /// Reject unusable settings; raise a too-small display delay to the floor.
    pub fn validate(&mut self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.sensors.is_empty() || self.sensors.len() > MAX_AUX_SOURCES {
            return Err(anyhow!(
                "between 1 and {} sensors are supported, got {}",
                MAX_AUX_SOURCES,
                self.sensors.len()
            ));
        }
        for sensor in &self.sensors {
            if sensor.delay.is_zero() {
                return Err(anyhow!("sensor '{}' delay must be greater than zero", sensor.name));
            }
        }
        if self.display.delay < MIN_DISPLAY_DELAY {
            log::info!(
                "display delay {:?} below floor, using {:?}",
                self.display.delay,
                MIN_DISPLAY_DELAY
            );
            self.display.delay = MIN_DISPLAY_DELAY;
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera.device.clone(),
            width: self.camera.width,
            height: self.camera.height,
            target_fps: self.camera.target_fps,
            frame_limit: None,
        }
    }
}

/// Parse a delay given in (possibly fractional) seconds.
pub fn parse_seconds(value: &str) -> Result<Duration> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("invalid delay '{}': {}", value, e))
}

fn sensor_name(index: usize) -> String {
    format!("sensor{}", index + 1)
}

fn sensors_from_delays(delays: impl IntoIterator<Item = Duration>) -> Vec<SensorSettings> {
    delays
        .into_iter()
        .enumerate()
        .map(|(i, delay)| SensorSettings {
            name: sensor_name(i),
            delay,
        })
        .collect()
}

fn read_config_file(path: &Path) -> Result<FusionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
