//! Application configuration
//!
//! Loaded from a TOML file; every section falls back to its defaults so a
//! partial (or missing) file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub routing: RoutingConfig,
    pub publisher: PublisherConfig,
    pub ui: UiConfig,
}

/// Spatializer identity and slot sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Node name of the spatializer's input side
    pub spatializer_input: String,
    /// Node name of the spatializer's output side (feedback detection)
    pub spatializer_output: String,
    /// Number of stereo slots (filter inputs = 2 * slots)
    pub slot_count: usize,
    /// Media class identifying candidate default sinks
    pub sink_media_class: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            spatializer_input: SPATIALIZER_INPUT_NAME.to_string(),
            spatializer_output: SPATIALIZER_OUTPUT_NAME.to_string(),
            slot_count: DEFAULT_SLOT_COUNT,
            sink_media_class: SINK_MEDIA_CLASS.to_string(),
        }
    }
}

impl RoutingConfig {
    /// Number of filter inputs on the spatializer
    pub fn filter_inputs(&self) -> usize {
        self.slot_count * 2
    }
}

/// Parameter push throttling and hysteresis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Minimum interval between two non-forced pushes for one channel
    pub throttle_ms: u64,
    /// Pose change (degrees / percent) below which a push is skipped
    pub pose_epsilon: f32,
    /// Gain change below which a push is skipped
    pub gain_epsilon: f32,
    /// Radius movement required before mixer gains are resent
    pub gain_radius_hysteresis: f32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            throttle_ms: PUBLISH_THROTTLE_MS,
            pose_epsilon: 0.25,
            gain_epsilon: 0.05,
            gain_radius_hysteresis: 0.5,
        }
    }
}

impl PublisherConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Control surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the platform config directory
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// `config.toml` inside the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "pipewire", "spatial-mixer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let routing = &self.routing;
        if routing.slot_count == 0 || routing.slot_count > MAX_SLOT_COUNT {
            return Err(Error::Config(format!(
                "slot_count must be within 1..={}, got {}",
                MAX_SLOT_COUNT, routing.slot_count
            )));
        }
        if routing.spatializer_input.is_empty() || routing.spatializer_output.is_empty() {
            return Err(Error::Config("spatializer node names must not be empty".into()));
        }

        let publisher = &self.publisher;
        if publisher.pose_epsilon < 0.0
            || publisher.gain_epsilon < 0.0
            || publisher.gain_radius_hysteresis < 0.0
        {
            return Err(Error::Config("publisher thresholds must be non-negative".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.routing.slot_count, 4);
        assert_eq!(config.routing.filter_inputs(), 8);
        assert_eq!(config.publisher.throttle(), Duration::from_millis(40));
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml(
            r#"
            [routing]
            slot_count = 2

            [ui]
            http_port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.routing.slot_count, 2);
        assert_eq!(config.routing.spatializer_input, "effect_input.multi_spatial");
        assert_eq!(config.ui.http_port, 9000);
        assert!(config.ui.enabled);
    }

    #[test]
    fn test_rejects_zero_slots() {
        let result = AppConfig::from_toml("[routing]\nslot_count = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        let result = AppConfig::from_toml("routing = 5");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }
}
