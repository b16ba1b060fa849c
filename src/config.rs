use crate::geometry::Point;
use crate::model::{ProgressEstimate, Rgba};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "tracktrail";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "tracktrail.log";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub circle_fill: Rgba,
    pub circle_hover: Rgba,
    pub unplayed: Rgba,
    pub played: Rgba,
    pub cursor_hint: Rgba,
    pub noise: Rgba,
    pub background: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            circle_fill: Rgba::opaque(104, 125, 142),
            circle_hover: Rgba::opaque(250, 250, 250),
            unplayed: Rgba::new(200, 200, 200, 0.2),
            played: Rgba::new(215, 237, 63, 0.8),
            cursor_hint: Rgba::new(20, 20, 20, 0.4),
            noise: Rgba::new(160, 160, 160, 0.1),
            background: Rgba::opaque(38, 44, 52),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Node circle radius, px.
    pub radius: f64,
    /// Segment stroke width, px.
    pub conn_width: f64,
    /// How far from a segment a pointer may be and still hit it, px.
    pub err_margin: f64,
    /// Minimum segment length, px. Must stay positive.
    pub base_length: f64,
    /// First node center. Derived from the surface size when unset.
    pub start: Option<Point>,
    pub colors: Palette,
    pub bg_stars_max_radius: f64,
    pub loop_interval_ms: u64,
    pub fps_interval_ms: u64,
    pub fps_filter: f64,
    pub volume: f32,
    pub volume_levels: u8,
    pub progress_estimate: ProgressEstimate,
    /// Fixed seed for the per-track layout randomness.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            radius: 10.0,
            conn_width: 4.0,
            err_margin: 10.0,
            base_length: 100.0,
            start: None,
            colors: Palette::default(),
            bg_stars_max_radius: 3.0,
            loop_interval_ms: 40,
            fps_interval_ms: 1000,
            fps_filter: 10.0,
            volume: 1.0,
            volume_levels: 10,
            progress_estimate: ProgressEstimate::default(),
            seed: None,
        }
    }
}

impl Settings {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms.max(1))
    }

    pub fn fps_interval(&self) -> Duration {
        Duration::from_millis(self.fps_interval_ms.max(1))
    }

    /// Start point for the first node on a surface of the given size.
    pub fn start_point(&self, width: f64, height: f64) -> Point {
        self.start.unwrap_or_else(|| {
            Point::new((width / 2.0).floor(), (height / 1.1).floor())
        })
    }

    /// Clamps values that would break layout or timing invariants.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.base_length.is_finite() && self.base_length > 0.0) {
            log::warn!(
                "base_length {} is not positive, using {}",
                self.base_length,
                defaults.base_length
            );
            self.base_length = defaults.base_length;
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            self.radius = defaults.radius;
        }
        if !(self.err_margin.is_finite() && self.err_margin >= 0.0) {
            self.err_margin = defaults.err_margin;
        }
        if !(self.fps_filter.is_finite() && self.fps_filter >= 1.0) {
            self.fps_filter = defaults.fps_filter;
        }
        if !(0.0..=1.0).contains(&self.volume) {
            self.volume = defaults.volume;
        }
        if self.volume_levels == 0 {
            self.volume_levels = defaults.volume_levels;
        }
        self
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("TRACKTRAIL_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_config_dir()?.join(LOG_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings.sanitized())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    ensure_config_dir()?;
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
