// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use edgecam::Config;
use edgecam::config::SourceKind;
use edgecam::constants::pipeline;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.source, SourceKind::Camera);
    assert_eq!(config.width, pipeline::DEFAULT_WIDTH);
    assert_eq!(config.height, pipeline::DEFAULT_HEIGHT);
    assert_eq!(config.frame_slots, pipeline::DEFAULT_FRAME_SLOTS);
    assert!(config.log_filter.is_none());
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        source: SourceKind::TestPattern,
        camera_index: 2,
        width: 1280,
        height: 720,
        log_filter: Some("edgecam=debug".to_string()),
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_missing_fields_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "source": "TestPattern", "render_fps": 0 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.source, SourceKind::TestPattern);
    assert_eq!(config.width, pipeline::DEFAULT_WIDTH);
    // Clamped on load
    assert_eq!(config.render_fps, 1);
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
    assert!(Config::load_from(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_source_config_from_settings() {
    let config = Config {
        width: 320,
        height: 240,
        framerate: 15,
        frame_slots: 4,
        ..Config::default()
    };
    let source = config.source_config();

    assert_eq!((source.width, source.height), (320, 240));
    assert_eq!(source.framerate.as_f64(), 15.0);
    assert_eq!(source.frame_slots, 4);
}
