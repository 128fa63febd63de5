use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use sightsense::config::{DetectorKind, SightConfig, SpeechEngine};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SIGHT_CONFIG",
        "SIGHT_LABELS_PATH",
        "SIGHT_DETECTOR",
        "SIGHT_SCRIPT_PATH",
        "SIGHT_MODEL_PATH",
        "SIGHT_SPEECH_ENGINE",
        "SIGHT_COOLDOWN_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SightConfig::load().expect("load defaults");

    assert_eq!(cfg.labels_path, PathBuf::from("labels.txt"));
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.source.target_fps, 10);
    assert_eq!(cfg.detector.backend, DetectorKind::Scripted);
    assert!(cfg.detector.script_path.is_none());
    assert_eq!(cfg.speech.engine, SpeechEngine::Log);
    assert_eq!(cfg.speech.program, "espeak-ng");
    assert_eq!(cfg.speech.words_per_minute, 170);
    assert_eq!(cfg.thresholds.min_confidence, 0.5);
    assert_eq!(cfg.thresholds.cooldown_ms, 1500);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "labels_path": "models/coco_labels.txt",
            "source": { "width": 320, "height": 240, "target_fps": 15 },
            "detector": { "backend": "scripted", "script_path": "frames.jsonl" },
            "speech": { "engine": "command", "program": "spd-say", "args": ["-w"] },
            "thresholds": { "stop_area_ratio": 0.5 }
        }"#,
    );

    std::env::set_var("SIGHT_CONFIG", file.path());
    std::env::set_var("SIGHT_LABELS_PATH", "/opt/sight/labels.txt");
    std::env::set_var("SIGHT_COOLDOWN_MS", "2000");

    let cfg = SightConfig::load().expect("load config");

    assert_eq!(cfg.labels_path, PathBuf::from("/opt/sight/labels.txt"));
    assert_eq!(cfg.source.width, 320);
    assert_eq!(cfg.source.height, 240);
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.detector.script_path, Some(PathBuf::from("frames.jsonl")));
    assert_eq!(cfg.speech.engine, SpeechEngine::Command);
    assert_eq!(cfg.speech.program, "spd-say");
    assert_eq!(cfg.speech.args, vec!["-w".to_string()]);
    assert_eq!(cfg.thresholds.stop_area_ratio, 0.5);
    // Unset threshold fields keep their defaults.
    assert_eq!(cfg.thresholds.step_area_ratio, 0.35);
    assert_eq!(cfg.thresholds.cooldown_ms, 2000);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
labels_path = "labels.txt"

[detector]
backend = "tract"
model_path = "ssd_mobilenet.onnx"

[speech]
engine = "log"
words_per_minute = 200

[thresholds]
center_zone_half_width = 0.2
"#,
    );
    std::env::set_var("SIGHT_CONFIG", file.path());
    std::env::set_var("SIGHT_DETECTOR", "scripted");
    std::env::set_var("SIGHT_SCRIPT_PATH", "replay.jsonl");

    let cfg = SightConfig::load().expect("load toml config");

    assert_eq!(cfg.detector.backend, DetectorKind::Scripted);
    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("ssd_mobilenet.onnx")));
    assert_eq!(cfg.detector.script_path, Some(PathBuf::from("replay.jsonl")));
    assert_eq!(cfg.speech.words_per_minute, 200);
    assert_eq!(cfg.thresholds.center_zone_half_width, 0.2);

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let misordered = write_config(
        ".json",
        r#"{ "thresholds": { "close_area_ratio": 0.4, "step_area_ratio": 0.35 } }"#,
    );
    std::env::set_var("SIGHT_CONFIG", misordered.path());
    assert!(SightConfig::load().is_err());

    let zero_fps = write_config(".json", r#"{ "source": { "target_fps": 0 } }"#);
    std::env::set_var("SIGHT_CONFIG", zero_fps.path());
    assert!(SightConfig::load().is_err());

    let empty_program = write_config(
        ".json",
        r#"{ "speech": { "engine": "command", "program": "  " } }"#,
    );
    std::env::set_var("SIGHT_CONFIG", empty_program.path());
    assert!(SightConfig::load().is_err());

    clear_env();
    std::env::set_var("SIGHT_SPEECH_ENGINE", "telepathy");
    assert!(SightConfig::load().is_err());

    clear_env();
    std::env::set_var("SIGHT_COOLDOWN_MS", "soon");
    assert!(SightConfig::load().is_err());

    clear_env();
    std::env::set_var("SIGHT_CONFIG", "/nonexistent/sight.json");
    assert!(SightConfig::load().is_err());

    clear_env();
}
