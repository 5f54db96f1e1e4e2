// Loop rates, timeouts, drive limits and camera defaults
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Steering can never exceed this much of the wheel power range
pub const STEERING_LIMIT: f32 = 0.4;

// Camera settling time after start and before release
pub const CAMERA_WARMUP: Duration = Duration::from_secs(2);
pub const CAMERA_COOLDOWN: Duration = Duration::from_secs(2);

// Capture defaults
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FRAMERATE: u32 = 90;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level runtime configuration, every field falls back to the constants above
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub drive: DriveConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    pub loop_hz: u64,
    /// `None` disables the watchdog (for sources that only emit on change)
    pub cmd_timeout_ms: Option<u64>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            cmd_timeout_ms: Some(CMD_TIMEOUT.as_millis() as u64),
        }
    }
}

impl DriveConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz)
    }

    pub fn cmd_timeout(&self) -> Option<Duration> {
        self.cmd_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub warmup_ms: u64,
    pub cooldown_ms: u64,
    /// Camera is mounted upside down
    pub rotate_180: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: DEFAULT_FRAMERATE,
            warmup_ms: CAMERA_WARMUP.as_millis() as u64,
            cooldown_ms: CAMERA_COOLDOWN.as_millis() as u64,
            rotate_180: true,
        }
    }
}

impl CameraConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl RuntimeConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drive.loop_hz == 0 || self.drive.loop_hz > 1000 {
            return Err(ConfigError::Invalid {
                field: "drive.loop_hz",
                reason: format!("{} is outside 1..=1000", self.drive.loop_hz),
            });
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid {
                field: "camera",
                reason: format!(
                    "resolution {}x{} is empty",
                    self.camera.width, self.camera.height
                ),
            });
        }
        if self.camera.framerate == 0 {
            return Err(ConfigError::Invalid {
                field: "camera.framerate",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.drive.loop_hz, 50);
        assert_eq!(config.drive.tick_period(), Duration::from_millis(20));
        assert_eq!(config.drive.cmd_timeout(), Some(CMD_TIMEOUT));
        assert_eq!(config.camera.warmup(), Duration::from_secs(2));
        assert_eq!(config.camera.cooldown(), Duration::from_secs(2));
        assert_eq!((config.camera.width, config.camera.height), (640, 480));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            RuntimeConfig::from_json(r#"{ "camera": { "framerate": 30 }, "drive": { "cmd_timeout_ms": null } }"#)
                .unwrap();
        assert_eq!(config.camera.framerate, 30);
        assert_eq!(config.camera.width, DEFAULT_WIDTH);
        assert_eq!(config.drive.cmd_timeout(), None);
        assert_eq!(config.drive.loop_hz, LOOP_HZ);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "drive": { "loop_hz": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "drive.loop_hz", .. }));

        let err = RuntimeConfig::from_json(r#"{ "camera": { "width": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = RuntimeConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
