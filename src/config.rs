//! Controller configuration.
//!
//! All tunables live in typed sections with documented defaults and are
//! validated once when loaded. Nothing downstream re-checks them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Access decision timing and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Seconds a recognized user must stay matched before the door opens.
    pub intent_time_sec: f64,
    /// Seconds an unrecognized face may stay before an alert is raised.
    pub loiter_time_sec: f64,
    /// Seconds the door stays unlocked before relocking.
    pub countdown_seconds: u64,
    /// Minimum match confidence (percent) for a known user.
    pub confidence_threshold: i32,
    /// Blinks required to confirm liveness.
    pub liveness_blinks: u32,
    /// Eye aspect ratio below which the eyes count as closed.
    pub ear_threshold: f64,
    /// Consecutive closed frames that make up one blink.
    pub ear_consec_frames: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            intent_time_sec: 1.0,
            loiter_time_sec: 10.0,
            countdown_seconds: 10,
            confidence_threshold: 86,
            liveness_blinks: 2,
            ear_threshold: 0.2,
            ear_consec_frames: 2,
        }
    }
}

impl AccessConfig {
    /// Intent dwell as a duration. Saturates for values `validate` rejects.
    pub fn intent_time(&self) -> Duration {
        seconds(self.intent_time_sec)
    }

    /// Loiter window as a duration. Saturates for values `validate` rejects.
    pub fn loiter_time(&self) -> Duration {
        seconds(self.loiter_time_sec)
    }

    /// Unlock countdown as a duration.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_seconds)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Duration::try_from_secs_f64(self.intent_time_sec).is_err() {
            return Err(ConfigError::InvalidDuration("intent_time_sec"));
        }
        if Duration::try_from_secs_f64(self.loiter_time_sec).is_err() {
            return Err(ConfigError::InvalidDuration("loiter_time_sec"));
        }
        if self.countdown_seconds == 0 {
            return Err(ConfigError::InvalidDuration("countdown_seconds"));
        }
        if self.liveness_blinks == 0 {
            return Err(ConfigError::InvalidLiveness("liveness_blinks must be at least 1"));
        }
        if self.ear_consec_frames == 0 {
            return Err(ConfigError::InvalidLiveness("ear_consec_frames must be at least 1"));
        }
        if !(self.ear_threshold > 0.0 && self.ear_threshold < 1.0) {
            return Err(ConfigError::InvalidLiveness("ear_threshold must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Negative or NaN maps to zero, overflow to `Duration::MAX`.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}

/// Relay controller link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0`, `COM5`).
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Door-ajar timeout pushed to the controller at startup.
    pub door_ajar_timeout_sec: u32,
    /// Read timeout for unsolicited status lines.
    pub read_timeout_ms: u64,
    /// Upper bound on waiting for a command acknowledgement.
    pub ack_timeout_ms: u64,
    /// Delay after opening the port while the controller resets.
    pub settle_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 9600,
            door_ajar_timeout_sec: 20,
            read_timeout_ms: 100,
            ack_timeout_ms: 500,
            settle_ms: 2000,
        }
    }
}

impl RelayConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::InvalidRelay("port must not be empty"));
        }
        if self.baud == 0 {
            return Err(ConfigError::InvalidRelay("baud must be positive"));
        }
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::InvalidRelay("ack_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Image encoding used for alert snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// `.jpg`
    Jpeg,
    /// `.png`
    Png,
}

impl SnapshotFormat {
    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Jpeg => "jpg",
            SnapshotFormat::Png => "png",
        }
    }
}

/// Where audit rows and snapshots are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Append-only CSV access log.
    pub access_log: PathBuf,
    /// Directory for unknown-person snapshots.
    pub snapshot_dir: PathBuf,
    /// Snapshot encoding.
    pub snapshot_format: SnapshotFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_log: PathBuf::from("access_log.csv"),
            snapshot_dir: PathBuf::from("intruders"),
            snapshot_format: SnapshotFormat::Jpeg,
        }
    }
}

/// Notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Deliver prompts at all.
    pub enabled: bool,
    /// Pending prompts held before new ones are rejected.
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 8,
        }
    }
}

/// Perception loop pacing and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pause between frames.
    pub frame_interval_ms: u64,
    /// Back-off after the camera stops delivering frames.
    pub gap_backoff_ms: u64,
    /// Pending manual commands held before senders see backpressure.
    pub command_capacity: usize,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 30,
            gap_backoff_ms: 1000,
            command_capacity: 16,
            metrics_port: 9090,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A time setting is negative, NaN or too large.
    #[error("invalid duration for {0}")]
    InvalidDuration(&'static str),
    /// A blink detection setting is out of range.
    #[error("invalid liveness setting: {0}")]
    InvalidLiveness(&'static str),
    /// A serial link setting is out of range.
    #[error("invalid relay setting: {0}")]
    InvalidRelay(&'static str),
    /// A queue would hold nothing.
    #[error("invalid queue capacity for {0} (must be at least 1)")]
    InvalidCapacity(&'static str),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file could not be written.
    #[error("failed to write config file: {0}")]
    FileWriteError(String),
    /// The file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Decision timings and thresholds.
    #[serde(default)]
    pub access: AccessConfig,
    /// Serial link to the lock controller.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Audit log and snapshot locations.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Prompt delivery.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Loop pacing and metrics port.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl FileConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.access.validate()?;
        self.relay.validate()?;
        if self.notify.queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("notify.queue_capacity"));
        }
        if self.worker.command_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("worker.command_capacity"));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Loads the file, or writes the defaults there first if it does not exist.
    ///
    /// Sections and keys missing from an existing file take their defaults.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }
        let config = FileConfig::default();
        config.save(path)?;
        tracing::info!(path = %path.display(), "Config file not found, wrote defaults");
        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::FileWriteError(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::FileWriteError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_countdown_invalid() {
        let mut config = AccessConfig::default();
        config.countdown_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration("countdown_seconds"))
        ));
    }

    #[test]
    fn test_negative_intent_invalid() {
        let mut config = AccessConfig::default();
        config.intent_time_sec = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_durations_rejected_on_load() {
        let result = FileConfig::from_toml("[access]\nintent_time_sec = 1e20\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration("intent_time_sec"))
        ));

        let result = FileConfig::from_toml("[access]\nloiter_time_sec = 1e20\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration("loiter_time_sec"))
        ));
    }

    #[test]
    fn test_duration_accessors_never_panic() {
        let config = AccessConfig {
            intent_time_sec: 1e20,
            loiter_time_sec: f64::NAN,
            ..AccessConfig::default()
        };
        assert_eq!(config.intent_time(), Duration::MAX);
        assert_eq!(config.loiter_time(), Duration::ZERO);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [access]
            intent_time_sec = 2.5

            [relay]
            port = "COM5"
            "#,
        )
        .unwrap();

        assert_eq!(config.access.intent_time(), Duration::from_millis(2500));
        assert_eq!(config.access.confidence_threshold, 86);
        assert_eq!(config.relay.port, "COM5");
        assert_eq!(config.relay.baud, 9600);
        assert_eq!(config.storage.snapshot_format, SnapshotFormat::Jpeg);
    }

    #[test]
    fn test_invalid_file_rejected_on_load() {
        let result = FileConfig::from_toml("[notify]\nqueue_capacity = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidCapacity(_))));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facegate.toml");

        let created = FileConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = FileConfig::from_file(&path).unwrap();
        assert_eq!(
            reloaded.access.countdown_seconds,
            created.access.countdown_seconds
        );
        assert_eq!(reloaded.relay.door_ajar_timeout_sec, 20);
    }
}
