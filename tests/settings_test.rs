use std::fs;
use std::time::Duration;

use folioview::controller::ControllerConfig;
use folioview::settings::{self, Settings};
use folioview::tabs::TabManagerConfig;
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn missing_config_file_is_created_with_defaults() {
    settings::replace(Settings::default());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("folioview").join("config.yaml");

    settings::load_settings_from_path(&path);

    assert!(path.exists());
    let written = Settings::load_from(&path).unwrap();
    assert_eq!(written.debounce_ms, 5);
    assert_eq!(written.autosave_interval_ms, 500);
    assert_eq!(settings::current(), Settings::default());
}

#[test]
#[serial]
fn config_file_drives_the_tab_manager() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    let data = dir.path().join("views.json");
    fs::write(
        &path,
        format!(
            "debounce_ms: 25\nbase_dpi: 144\nrender_margin_px: 40\nautosave_interval_ms: 2000\n\
             zoom_levels: [0.5, 1.0, 2.0]\ndata_path: {}\n",
            data.display()
        ),
    )
    .unwrap();

    settings::load_settings_from_path(&path);
    let current = settings::current();
    assert_eq!(settings::get_data_path(), Some(data));

    let config = TabManagerConfig::from(&current);
    assert_eq!(config.autosave_interval, Duration::from_secs(2));
    assert_eq!(config.controller.debounce, Duration::from_millis(25));
    assert_eq!(config.controller.render.base_dpi, 144.0);
    assert_eq!(config.controller.render.margin_px, 40.0);
    assert_eq!(config.controller.zoom.levels(), &[0.5f32, 1.0, 2.0]);

    settings::replace(Settings::default());
    assert_eq!(
        ControllerConfig::from(&settings::current()),
        ControllerConfig::default()
    );
}

#[test]
#[serial]
fn malformed_config_falls_back_to_defaults() {
    settings::replace(Settings {
        debounce_ms: 99,
        ..Settings::default()
    });
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "debounce_ms: {{{\n").unwrap();

    settings::load_settings_from_path(&path);
    assert_eq!(settings::current().debounce_ms, 5);
}
