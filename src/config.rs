//! Runtime configuration.
//!
//! Defaults reproduce the stock behaviour. An optional JSON file in the
//! platform config directory overrides them, and environment variables
//! (including a `.env` file) override the file:
//!   macOS:   ~/Library/Application Support/canvas-share/config.json
//!   Linux:   ~/.config/canvas-share/config.json
//!   Windows: %APPDATA%/canvas-share/config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://0x0.st";

/// Where pipeline errors are shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSurface {
    /// Non-blocking text in the feature's own panel.
    Inline,
    /// A queued blocking alert the host must acknowledge.
    Alert,
}

impl FromStr for ErrorSurface {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(ErrorSurface::Inline),
            "alert" => Ok(ErrorSurface::Alert),
            other => Err(ConfigError::InvalidValue {
                key: "error_surface".into(),
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Upload host receiving the multipart POST.
    pub endpoint: String,
    /// Id of the container whose first canvas the QR publisher captures.
    pub sketch_container: String,
    pub error_surface: ErrorSurface,
    /// Seconds before the upload result panel removes itself.
    pub panel_ttl_secs: u64,
    /// Seconds before the copy control reverts its label.
    pub copy_revert_secs: u64,
    /// Bounding box edge for the QR preview image.
    pub preview_max: u32,
    /// Pixels per QR module.
    pub qr_module_size: u32,
    pub download_filename: String,
    pub upload_filename: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sketch_container: "sketch-container".to_string(),
            error_surface: ErrorSurface::Inline,
            panel_ttl_secs: 30,
            copy_revert_secs: 2,
            preview_max: 200,
            qr_module_size: 5,
            download_filename: "shader_view.png".to_string(),
            upload_filename: "screenshot.png".to_string(),
        }
    }
}

impl ShareConfig {
    pub fn panel_ttl(&self) -> Duration {
        Duration::from_secs(self.panel_ttl_secs)
    }

    pub fn copy_revert(&self) -> Duration {
        Duration::from_secs(self.copy_revert_secs)
    }

    /// Loads defaults, then the config file, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("[CONFIG] Loaded {}", path.display());
        }

        let path = config_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::info!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    /// Applies `CANVAS_SHARE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CANVAS_SHARE_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("CANVAS_SHARE_SKETCH_CONTAINER") {
            self.sketch_container = v;
        }
        if let Some(v) = lookup("CANVAS_SHARE_ERROR_SURFACE") {
            self.error_surface = v.parse()?;
        }
        if let Some(v) = lookup("CANVAS_SHARE_PANEL_TTL_SECS") {
            self.panel_ttl_secs = parse_number("CANVAS_SHARE_PANEL_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("CANVAS_SHARE_COPY_REVERT_SECS") {
            self.copy_revert_secs = parse_number("CANVAS_SHARE_COPY_REVERT_SECS", &v)?;
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Location of the optional config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("canvas-share")
        .join("config.json")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_stock_behaviour() {
        let config = ShareConfig::default();
        assert_eq!(config.endpoint, "https://0x0.st");
        assert_eq!(config.sketch_container, "sketch-container");
        assert_eq!(config.panel_ttl(), Duration::from_secs(30));
        assert_eq!(config.copy_revert(), Duration::from_secs(2));
        assert_eq!(config.upload_filename, "screenshot.png");
    }

    #[test]
    fn env_overrides_are_applied() {
        let mut config = ShareConfig::default();
        config
            .apply_env(env(&[
                ("CANVAS_SHARE_ENDPOINT", "http://127.0.0.1:9999"),
                ("CANVAS_SHARE_ERROR_SURFACE", "Alert"),
                ("CANVAS_SHARE_PANEL_TTL_SECS", "5"),
            ]))
            .unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:9999");
        assert_eq!(config.error_surface, ErrorSurface::Alert);
        assert_eq!(config.panel_ttl_secs, 5);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = ShareConfig::default();
        let result = config.apply_env(env(&[("CANVAS_SHARE_COPY_REVERT_SECS", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ShareConfig =
            serde_json::from_str(r#"{ "error_surface": "alert", "preview_max": 120 }"#).unwrap();
        assert_eq!(config.error_surface, ErrorSurface::Alert);
        assert_eq!(config.preview_max, 120);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn config_path_is_under_canvas_share() {
        let path = config_path();
        let s = path.to_string_lossy();
        assert!(s.contains("canvas-share"));
        assert!(s.ends_with("config.json"));
    }
}
