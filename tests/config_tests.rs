use colorizer_engine::EngineConfig;
use std::io::Write;

#[test]
fn test_defaults_are_valid() {
    let config = EngineConfig::default();
    assert!(config.worker_count >= 1 && config.worker_count <= 8);
    assert_eq!(config.max_texture_width, 4096);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = EngineConfig::from_json(serde_json::json!({
        "worker_count": 3,
        "motion_window_frames": 9
    }))
    .unwrap();

    assert_eq!(config.worker_count, 3);
    assert_eq!(config.motion_window_frames, 9);
    assert_eq!(config.fetch_timeout_ms, EngineConfig::default().fetch_timeout_ms);
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = EngineConfig::from_json(serde_json::json!({ "worker_count": 0 })).unwrap_err();
    assert!(err.to_string().contains("worker_count"));

    assert!(EngineConfig::from_json(serde_json::json!({ "max_texture_width": "wide" })).is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"worker_count": 2, "correlation_cache_capacity": 4}}"#).unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.worker_count, 2);
    assert_eq!(config.correlation_cache_capacity, 4);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");

    let err = EngineConfig::load(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("engine.json"));
}

#[test]
fn test_fetch_limit_is_configurable() {
    let config = EngineConfig::from_json(serde_json::json!({ "max_fetch_bytes": 4096 })).unwrap();
    assert_eq!(config.max_fetch_bytes, 4096);
    assert!(EngineConfig::default().max_fetch_bytes >= 1 << 20);

    let err = EngineConfig::from_json(serde_json::json!({ "max_fetch_bytes": 0 })).unwrap_err();
    assert!(err.to_string().contains("max_fetch_bytes"));
}
