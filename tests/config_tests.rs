// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use std::path::PathBuf;

use depthcam_view::channel::RedrawPolicy;
use depthcam_view::constants::{DEFAULT_COLOR_FPS, DEFAULT_DEPTH_FPS, FPS_REPORT_INTERVAL};
use depthcam_view::errors::ConfigError;
use depthcam_view::{Config, ViewMode};

/// Scratch file unique to one test
fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("depthcam-view-test-{}", std::process::id()))
        .join(name)
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    // Check sensible defaults
    assert_eq!((config.width, config.height), (640, 480));
    assert_eq!(config.depth_fps, DEFAULT_DEPTH_FPS);
    assert_eq!(config.color_fps, DEFAULT_COLOR_FPS);
    assert!(
        config.color_fps < config.depth_fps,
        "Color should run slower than depth by default"
    );
    assert_eq!(config.redraw_policy, RedrawPolicy::AnyStream);
    assert_eq!(config.fps_report_interval, FPS_REPORT_INTERVAL);
    assert_eq!(config.view_mode, ViewMode::Overlay);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_save_and_load() {
    let path = scratch_path("round-trip");
    let config = Config {
        depth_fps: 60,
        redraw_policy: RedrawPolicy::BothStreams,
        view_mode: ViewMode::Depth,
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_missing_file_yields_defaults() {
    let path = scratch_path("missing");
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let path = scratch_path("partial");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "color_fps": 5, "gradient": { "gain": 18.0 } }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.color_fps, 5);
    assert_eq!(loaded.gradient.gain, 18.0);
    assert_eq!(loaded.depth_fps, DEFAULT_DEPTH_FPS);
    assert_eq!(
        loaded.gradient.table_len,
        Config::default().gradient.table_len
    );

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let path = scratch_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Parse { .. })
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_validate_rejects_zero_values() {
    let cases = [
        (
            Config {
                width: 0,
                ..Config::default()
            },
            "width",
        ),
        (
            Config {
                height: 0,
                ..Config::default()
            },
            "height",
        ),
        (
            Config {
                depth_fps: 0,
                ..Config::default()
            },
            "depth_fps",
        ),
        (
            Config {
                color_fps: 0,
                ..Config::default()
            },
            "color_fps",
        ),
        (
            Config {
                fps_report_interval: 0,
                ..Config::default()
            },
            "fps_report_interval",
        ),
    ];

    for (config, expected) in cases {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("{} accepted: {:?}", expected, other),
        }
    }
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let path = scratch_path("invalid");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "depth_fps": 0 }"#).unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Invalid {
            field: "depth_fps",
            ..
        })
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
