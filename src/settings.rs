use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::renderer::{DEFAULT_MARGIN_PX, DEFAULT_THRESHOLD_PX, RenderConfig};
use crate::zoom::{DEFAULT_WHEEL_FACTOR, DEFAULT_ZOOM_LEVELS, ZoomLadder};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const DATA_FILENAME: &str = "data.json";
pub const APP_NAME: &str = "folioview";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Quiet period between the last view change and the render pass
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_render_margin_px")]
    pub render_margin_px: f32,

    #[serde(default = "default_render_threshold_px")]
    pub render_threshold_px: f32,

    /// Raster resolution at 100% zoom
    #[serde(default = "default_base_dpi")]
    pub base_dpi: f32,

    #[serde(default = "default_zoom_levels")]
    pub zoom_levels: Vec<f32>,

    #[serde(default = "default_wheel_zoom_factor")]
    pub wheel_zoom_factor: f32,

    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,

    /// Application data blob holding `file_states`
    #[serde(default = "default_data_path", skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,

    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_debounce_ms() -> u64 {
    5
}

fn default_render_margin_px() -> f32 {
    DEFAULT_MARGIN_PX
}

fn default_render_threshold_px() -> f32 {
    DEFAULT_THRESHOLD_PX
}

fn default_base_dpi() -> f32 {
    72.0
}

fn default_zoom_levels() -> Vec<f32> {
    DEFAULT_ZOOM_LEVELS.to_vec()
}

fn default_wheel_zoom_factor() -> f32 {
    DEFAULT_WHEEL_FACTOR
}

fn default_autosave_interval_ms() -> u64 {
    500
}

fn default_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|data| data.join(APP_NAME).join(DATA_FILENAME))
}

fn default_notification_secs() -> u64 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            debounce_ms: default_debounce_ms(),
            render_margin_px: default_render_margin_px(),
            render_threshold_px: default_render_threshold_px(),
            base_dpi: default_base_dpi(),
            zoom_levels: default_zoom_levels(),
            wheel_zoom_factor: default_wheel_zoom_factor(),
            autosave_interval_ms: default_autosave_interval_ms(),
            data_path: default_data_path(),
            notification_secs: default_notification_secs(),
        }
    }
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }

    pub fn render_config(&self) -> RenderConfig {
        let defaults = RenderConfig::default();
        RenderConfig {
            margin_px: non_negative(self.render_margin_px, defaults.margin_px),
            threshold_px: non_negative(self.render_threshold_px, defaults.threshold_px),
            base_dpi: if self.base_dpi.is_finite() && self.base_dpi > 0.0 {
                self.base_dpi
            } else {
                defaults.base_dpi
            },
        }
    }

    pub fn zoom_ladder(&self) -> ZoomLadder {
        ZoomLadder::new(&self.zoom_levels, self.wheel_zoom_factor)
    }

    /// Read settings from `path`. Unreadable or malformed files yield `None`
    /// and are reported through the log.
    pub fn load_from(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path)
            .inspect_err(|e| error!("Failed to read settings file {path:?}: {e}"))
            .ok()?;
        let mut settings = serde_yaml::from_str::<Settings>(&content)
            .inspect_err(|e| error!("Failed to parse settings file {path:?}: {e}"))
            .ok()?;
        debug!("Loaded settings from {path:?}");

        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
            settings.save_to(path);
        }
        Some(settings)
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create config directory {parent:?}: {e}");
                    return;
                }
            }
        }

        let body = match serde_yaml::to_string(self) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize settings: {e}");
                return;
            }
        };

        match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
            Ok(()) => debug!("Saved settings to {path:?}"),
            Err(e) => error!("Failed to save settings to {path:?}: {e}"),
        }
    }
}

fn non_negative(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

const SETTINGS_HEADER: &str = r#"# folioview configuration
#
# debounce_ms          quiet period before a render pass after scrolling/zooming
# render_margin_px     prefetch band rendered around the visible region
# render_threshold_px  how far the view must move before re-rasterizing
# base_dpi             raster resolution at 100% zoom (144 for HiDPI screens)
# zoom_levels          presets walked by zoom in / zoom out
# data_path            where per-document view state is stored

"#;

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the configuration file into the global settings, creating it with
/// defaults when it does not exist yet.
pub fn load_settings() {
    let Some(path) = config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    load_settings_from_path(&path);
}

pub fn load_settings_from_path(path: &Path) {
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            settings.save_to(path);
        }
        return;
    }

    let settings = Settings::load_from(path).unwrap_or_default();
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

/// Snapshot of the global settings.
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn replace(settings: Settings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

pub fn get_data_path() -> Option<PathBuf> {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| s.data_path.clone())
        .or_else(default_data_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_yaml::from_str("debounce_ms: 20\n").unwrap();
        assert_eq!(settings.debounce(), Duration::from_millis(20));
        assert_eq!(settings.render_margin_px, 80.0);
        assert_eq!(settings.zoom_levels.len(), 24);
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join(SETTINGS_FILENAME);
        let settings = Settings {
            base_dpi: 144.0,
            data_path: Some(dir.path().join("data.json")),
            ..Settings::default()
        };
        settings.save_to(&path);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# folioview configuration"));
        assert_eq!(Settings::load_from(&path), Some(settings));
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "debounce_ms: [not, a, number]\n").unwrap();
        assert_eq!(Settings::load_from(&path), None);
    }

    #[test]
    fn old_version_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "version: 0\nbase_dpi: 96\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.base_dpi, 96.0);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(&format!("version: {CURRENT_VERSION}")));
    }

    #[test]
    fn bad_render_values_fall_back() {
        let settings = Settings {
            render_margin_px: -5.0,
            base_dpi: 0.0,
            ..Settings::default()
        };
        let config = settings.render_config();
        assert_eq!(config.margin_px, DEFAULT_MARGIN_PX);
        assert_eq!(config.base_dpi, 72.0);
    }
}
