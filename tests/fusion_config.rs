use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use sensor_fusion::config::FusionConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FUSION_CONFIG",
        "FUSION_CAMERA_DEVICE",
        "FUSION_CAMERA_WIDTH",
        "FUSION_CAMERA_HEIGHT",
        "FUSION_DISPLAY_DELAY_MS",
        "FUSION_SENSOR_DELAYS_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn delays_ms(cfg: &FusionConfig) -> Vec<u128> {
    cfg.sensors.iter().map(|s| s.delay.as_millis()).collect()
}

#[test]
fn loads_defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FusionConfig::load().expect("load config");
    assert_eq!(cfg, FusionConfig::default());
}

#[test]
fn loads_config_from_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": {
            "device": "/dev/video2",
            "width": 800,
            "height": 600,
            "target_fps": 15
        },
        "display": { "delay_ms": 40 },
        "sensors": [
            { "name": "imu", "delay_ms": 5 },
            { "delay_ms": 250 }
        ]
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("FUSION_CONFIG", file.path());
    std::env::set_var("FUSION_CAMERA_HEIGHT", "720");

    let cfg = FusionConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "/dev/video2");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 720);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.display.delay, Duration::from_millis(40));
    assert_eq!(cfg.sensors[0].name, "imu");
    assert_eq!(cfg.sensors[1].name, "sensor2");
    assert_eq!(delays_ms(&cfg), vec![5, 250]);

    let camera = cfg.camera_config();
    assert_eq!(camera.device, "/dev/video2");
    assert_eq!(camera.frame_limit, None);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[camera]
device = "stub://bench"

[display]
delay_ms = 25

[[sensors]]
name = "thermo"
delay_ms = 500
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("FUSION_CONFIG", file.path());

    let cfg = FusionConfig::load().expect("load config");
    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
    assert_eq!(cfg.display.delay, Duration::from_millis(25));
    assert_eq!(cfg.sensors.len(), 1);
    assert_eq!(cfg.sensors[0].name, "thermo");

    clear_env();
}

#[test]
fn env_sensor_delays_replace_the_sensor_list() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FUSION_SENSOR_DELAYS_MS", "20, 200");
    std::env::set_var("FUSION_DISPLAY_DELAY_MS", "1");

    let cfg = FusionConfig::load().expect("load config");
    assert_eq!(delays_ms(&cfg), vec![20, 200]);
    assert_eq!(cfg.sensors[1].name, "sensor2");
    // Below the floor, so raised to it.
    assert_eq!(cfg.display.delay, Duration::from_millis(10));

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FUSION_CAMERA_WIDTH", "wide");
    assert!(FusionConfig::load().is_err());
    clear_env();

    std::env::set_var("FUSION_SENSOR_DELAYS_MS", "10,fast");
    assert!(FusionConfig::load().is_err());
    clear_env();

    std::env::set_var("FUSION_SENSOR_DELAYS_MS", "0");
    assert!(FusionConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_missing_or_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FUSION_CONFIG", "/nonexistent/fusion.json");
    assert!(FusionConfig::load().is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    std::env::set_var("FUSION_CONFIG", file.path());
    let err = FusionConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
