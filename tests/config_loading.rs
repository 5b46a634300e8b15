use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use live_overlay::config::StreamConfig;
use live_overlay::preprocess::ResizePolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LIVE_OVERLAY_CONFIG",
        "LIVE_OVERLAY_MODEL",
        "LIVE_OVERLAY_LABELS",
        "LIVE_OVERLAY_URL",
        "LIVE_OVERLAY_CAMERA_ID",
        "LIVE_OVERLAY_FRAME_WIDTH",
        "LIVE_OVERLAY_FRAME_HEIGHT",
        "LIVE_OVERLAY_TARGET_FPS",
        "LIVE_OVERLAY_MIRROR",
        "LIVE_OVERLAY_MAX_CONSECUTIVE_FAILURES",
        "LIVE_OVERLAY_WORKERS",
        "LIVE_OVERLAY_SCORE_THRESHOLD",
        "LIVE_OVERLAY_SHOW_FPS",
        "LIVE_OVERLAY_WINDOW",
        "LIVE_OVERLAY_DUMP_DIR",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "model": "models/efficientdet.onnx",
            "labels": "models/labels.txt",
            "capture": {
                "url": "stub://desk?frames=30",
                "camera_id": 2,
                "frame_width": 640,
                "frame_height": 480,
                "target_fps": 15,
                "max_consecutive_failures": 5
            },
            "engine": {
                "workers": 2,
                "queue_depth": 4,
                "score_threshold": 0.3,
                "simulated_latency_ms": 20
            },
            "display": {
                "window_name": "Classifier",
                "show_fps": true
            },
            "preprocess": { "policy": "fit_within", "width": 320, "height": 320 },
            "rate_window": 30
        }"#,
    );

    std::env::set_var("LIVE_OVERLAY_CONFIG", file.path());
    std::env::set_var("LIVE_OVERLAY_CAMERA_ID", "1");
    std::env::set_var("LIVE_OVERLAY_MIRROR", "no");
    std::env::set_var("LIVE_OVERLAY_SHOW_FPS", "0");
    std::env::set_var("LIVE_OVERLAY_TARGET_FPS", "30");

    let cfg = StreamConfig::load().expect("load config");

    assert_eq!(cfg.model, "models/efficientdet.onnx");
    assert_eq!(cfg.labels.as_deref(), Some(std::path::Path::new("models/labels.txt")));
    assert_eq!(cfg.capture.url.as_deref(), Some("stub://desk?frames=30"));
    assert_eq!(cfg.capture.camera_id, 1);
    assert_eq!(cfg.capture.frame_width, 640);
    assert_eq!(cfg.capture.frame_height, 480);
    assert_eq!(cfg.capture.target_fps, 30);
    assert!(!cfg.capture.mirror);
    assert_eq!(cfg.capture.max_consecutive_failures, 5);
    assert_eq!(cfg.engine.workers, 2);
    assert_eq!(cfg.engine.queue_depth, 4);
    assert!((cfg.engine.score_threshold - 0.3).abs() < f32::EPSILON);
    assert_eq!(cfg.engine.simulated_latency, Duration::from_millis(20));
    assert_eq!(cfg.display.window_name, "Classifier");
    assert!(!cfg.display.show_fps);
    assert_eq!(
        cfg.preprocess,
        ResizePolicy::FitWithin {
            width: 320,
            height: 320
        }
    );
    assert_eq!(cfg.rate_window, 30);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVE_OVERLAY_URL", "stub://front");
    let cfg = StreamConfig::load().expect("load config");

    assert!(cfg.uses_stub_model());
    assert_eq!(cfg.capture.url.as_deref(), Some("stub://front"));
    assert_eq!(cfg.capture.frame_width, 1280);
    assert_eq!(cfg.capture.frame_height, 720);
    assert_eq!(cfg.capture.target_fps, 0);
    assert!(cfg.capture.mirror);
    assert_eq!(cfg.capture.max_consecutive_failures, 1);

    clear_env();
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVE_OVERLAY_SHOW_FPS", "sometimes");
    let err = StreamConfig::load().expect_err("boolean must parse");
    assert!(err.to_string().contains("LIVE_OVERLAY_SHOW_FPS"));

    clear_env();
    std::env::set_var("LIVE_OVERLAY_WORKERS", "0");
    assert!(StreamConfig::load().is_err());

    clear_env();
}

#[test]
fn unreadable_or_malformed_files_fail() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let missing = std::path::Path::new("/nonexistent/live_overlay.json");
    assert!(StreamConfig::load_from(Some(missing)).is_err());

    let malformed = write_config(r#"{ "preprocess": { "policy": "stretch" } }"#);
    let err = StreamConfig::load_from(Some(malformed.path())).expect_err("unknown policy");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
