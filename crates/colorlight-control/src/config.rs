//! Controller configuration
//!
//! Read once at startup from JSON. A missing file means defaults; a file
//! that exists but does not parse is an error. The controller never writes
//! its configuration back.

use crate::audio::EngineConfig;
use crate::error::{ControlError, Result};
use colorlight_core::{AnalyzerConfig, AudioReactiveConfig, LogConfig, Rgb};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quiet interval for slider-driven color updates
    pub debounce_ms: u64,
    /// Color sent to a fixture right after it connects
    pub initial_color: Rgb,
    /// Audio loop timing
    pub engine: EngineConfig,
    /// Audio-to-color synthesis settings
    pub audio: AudioReactiveConfig,
    /// Spectrum analyzer settings for live capture
    pub analyzer: AnalyzerConfig,
    pub logging: LogConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            initial_color: Rgb::RED,
            engine: EngineConfig::default(),
            audio: AudioReactiveConfig::default(),
            analyzer: AnalyzerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// `<config dir>/colorlight/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("colorlight");
            p.push("config.json");
            p
        })
    }

    /// Load from `path`, or from [`ControllerConfig::default_path`] when
    /// `None`. Missing files yield the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory on this platform; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::from_json(&content)
            .map_err(|e| ControlError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorlight_core::{EffectMode, Sensitivity};

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.debounce_interval(), Duration::from_millis(100));
        assert_eq!(config.initial_color, Rgb::RED);
        assert_eq!(config.engine.send_interval(), Duration::from_millis(50));
        assert_eq!(config.analyzer.fft_size, 4096);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ControllerConfig::from_json(
            r#"{
                "debounce_ms": 250,
                "audio": { "mode": "musicalScale", "sensitivity": 8 },
                "engine": { "send_interval_ms": 80 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.audio.mode, EffectMode::MusicalScale);
        assert_eq!(config.audio.sensitivity, Sensitivity::new(8));
        assert_eq!(config.engine.send_interval_ms, 80);
        assert_eq!(config.engine.frame_interval_ms, 16);
        assert_eq!(config.audio.base_color, Rgb::RED);
    }

    #[test]
    fn test_out_of_range_sensitivity_rejected() {
        let err = ControllerConfig::from_json(r#"{ "audio": { "sensitivity": 11 } }"#);
        assert!(matches!(err, Err(ControlError::JsonError(_))));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ControllerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ControlError::Config(msg) if msg.contains("config.json")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "initial_color": { "r": 0, "g": 0, "b": 255 } }"#).unwrap();

        let config = ControllerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.initial_color, Rgb::new(0, 0, 255));
    }
}
