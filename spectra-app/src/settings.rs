//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spectra_core::{MagnitudeMode, PipelineConfig, TransformSize, WindowType};

/// Lowest y-axis floor accepted; log scaling needs a strictly positive floor.
const MIN_Y_FLOOR: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub transform_size: usize,
    pub window: WindowType,
    pub magnitude: MagnitudeMode,
    pub render_fps: u32,
    pub columns: usize,
    pub y_floor: f32,
    pub y_ceiling: f32,
    /// Draw the right channel first.
    pub swap_channels: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            transform_size: TransformSize::DEFAULT.get(),
            window: WindowType::BlackmanHarris,
            magnitude: MagnitudeMode::Exact,
            render_fps: 30,
            columns: 96,
            y_floor: 0.001,
            y_ceiling: 100.0,
            swap_channels: false,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.transform_size = TransformSize::nearest(self.transform_size).get();
        self.render_fps = self.render_fps.clamp(1, 240);
        self.columns = self.columns.clamp(8, 512);

        if !self.y_floor.is_finite() || self.y_floor < MIN_Y_FLOOR {
            self.y_floor = MIN_Y_FLOOR;
        }
        if !self.y_ceiling.is_finite() || self.y_ceiling <= self.y_floor * 10.0 {
            self.y_ceiling = (self.y_floor * 10.0).max(AppSettings::default().y_ceiling);
        }

        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// Pipeline configuration derived from these settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            transform_size: self.transform_size,
            window: self.window,
            magnitude: self.magnitude,
            ..PipelineConfig::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.render_fps.max(1)
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Spectra")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("spectra")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
