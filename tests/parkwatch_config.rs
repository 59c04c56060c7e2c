use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use parkwatch::config::EngineConfig;
use parkwatch::CachePolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PARKWATCH_CONFIG",
        "PARKWATCH_REGIONS",
        "PARKWATCH_CONFIDENCE",
        "PARKWATCH_SHOW_LABELS",
        "PARKWATCH_CLASSES",
        "PARKWATCH_HOLD_FRAMES",
        "PARKWATCH_FONT",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "regions": { "path": "lot_a.json", "cache": "cached" },
        "detection": { "confidence_threshold": 0.4, "classes": [2, 3] },
        "annotate": { "show_labels": true, "draw_detections": true },
        "tracking": { "hold_frames": 3 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PARKWATCH_CONFIG", file.path());
    std::env::set_var("PARKWATCH_CONFIDENCE", "0.6");
    std::env::set_var("PARKWATCH_CLASSES", "7, 8");

    let cfg = EngineConfig::load().expect("load config");

    assert_eq!(cfg.regions_path, PathBuf::from("lot_a.json"));
    assert_eq!(cfg.region_cache, CachePolicy::Cached);
    assert_eq!(cfg.detect.confidence_threshold, 0.6);
    assert_eq!(cfg.detect.class_filter.iter().copied().collect::<Vec<_>>(), vec![7, 8]);
    assert!(cfg.annotate.show_labels);
    assert!(cfg.annotate.draw_detections);
    assert_eq!(cfg.hold_frames, 3);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[regions]
path = "slots.json"

[detection]
classes = []

[tracking]
hold_frames = 2
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("PARKWATCH_CONFIG", file.path());
    std::env::set_var("PARKWATCH_SHOW_LABELS", "yes");

    let cfg = EngineConfig::load().expect("load config");
    assert_eq!(cfg.regions_path, PathBuf::from("slots.json"));
    assert!(cfg.detect.class_filter.is_empty());
    assert_eq!(cfg.detect.confidence_threshold, 0.25);
    assert!(cfg.annotate.show_labels);
    assert_eq!(cfg.hold_frames, 2);
    assert_eq!(cfg.region_cache, CachePolicy::ReloadEveryFrame);

    clear_env();
}

#[test]
fn rejects_bad_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PARKWATCH_CONFIDENCE", "1.5");
    assert!(EngineConfig::load().is_err());

    std::env::set_var("PARKWATCH_CONFIDENCE", "high");
    assert!(EngineConfig::load().is_err());
    clear_env();

    std::env::set_var("PARKWATCH_HOLD_FRAMES", "-1");
    assert!(EngineConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"regions": {"cache": "sometimes"}}"#)
        .expect("write config");
    std::env::set_var("PARKWATCH_CONFIG", file.path());
    assert!(EngineConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_font_fails_engine_construction() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PARKWATCH_FONT", "/nonexistent/font.ttf");
    let cfg = EngineConfig::load().expect("load config");
    assert!(cfg.engine().is_err());

    clear_env();
}
