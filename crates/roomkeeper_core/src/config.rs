//! Service configuration.
//!
//! A deployment runs the core role (membership publisher), the collector
//! role (feed ingestion), or both. When both run in one process the room
//! set is replicated in memory; otherwise it goes through the shared
//! coordination store.

use crate::error::{CoreError, CoreResult};
use crate::retry::RetryConfig;
use crate::room::RoomId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level service configuration, loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Which roles this process runs.
    pub service: ServiceRoles,
    /// Coordination store endpoints (required for split deployments).
    pub store_endpoints: Vec<String>,
    /// Logging settings.
    pub log: LogSection,
    /// Room-set replication settings.
    pub bridge: BridgeSection,
    /// Feed ingestion settings.
    pub collector: CollectorSection,
    /// Rooms published at startup.
    pub rooms: Vec<u64>,
}

/// Roles enabled in this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRoles {
    /// Publishes room membership changes.
    pub core: bool,
    /// Maintains feed connections for tracked rooms.
    pub collector: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// One of `debug`, `info`, `warn`, `error` (case-insensitive).
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Room-set replication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Prefix of membership keys in the coordination store.
    pub key_prefix: String,
    /// Pause before re-establishing a failed watch, in milliseconds.
    pub watch_retry_delay_ms: u64,
}

/// Feed ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    /// Reconnect backoff.
    pub retry: RetrySection,
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// First delay, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

/// How the room set travels from publisher to collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Publisher and collector share a process.
    Local,
    /// Publisher and collector coordinate through the store.
    Distributed,
}

/// Parsed log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug and above.
    Debug,
    /// Info and above.
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the directive understood by an env-filter.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl LogSection {
    /// Parsed level; unknown values fall back to info.
    pub fn log_level(&self) -> LogLevel {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl Default for ServiceRoles {
    fn default() -> Self {
        Self {
            core: true,
            collector: true,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            key_prefix: "room_".into(),
            watch_retry_delay_ms: 1000,
        }
    }
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            retry: RetrySection::default(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: ServiceRoles::default(),
            store_endpoints: Vec::new(),
            log: LogSection::default(),
            bridge: BridgeSection::default(),
            collector: CollectorSection::default(),
            rooms: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses and validates a configuration document.
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let mut config: ServiceConfig = serde_json::from_str(raw)?;
        config.log.level = config.log.level.to_ascii_lowercase();
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.service.core || self.service.collector) {
            return Err(CoreError::invalid_config("no service role enabled"));
        }
        if self.bridge_mode() == BridgeMode::Distributed && self.store_endpoints.is_empty() {
            return Err(CoreError::invalid_config(
                "split deployment requires store_endpoints",
            ));
        }
        if self.bridge.key_prefix.is_empty() {
            return Err(CoreError::invalid_config("bridge.key_prefix is empty"));
        }
        let retry = &self.collector.retry;
        if retry.initial_delay_ms == 0 || retry.max_delay_ms < retry.initial_delay_ms {
            return Err(CoreError::invalid_config(format!(
                "bad retry window {}ms..{}ms",
                retry.initial_delay_ms, retry.max_delay_ms
            )));
        }
        if !(retry.backoff_multiplier.is_finite() && retry.backoff_multiplier >= 1.0) {
            return Err(CoreError::invalid_config(format!(
                "bad backoff multiplier {}",
                retry.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Local when both roles share this process, distributed otherwise.
    pub fn bridge_mode(&self) -> BridgeMode {
        if self.service.core && self.service.collector {
            BridgeMode::Local
        } else {
            BridgeMode::Distributed
        }
    }

    /// Parsed log level; unknown values fall back to info.
    pub fn log_level(&self) -> LogLevel {
        self.log.log_level()
    }

    /// Reconnect policy for feed sessions.
    pub fn retry_config(&self) -> RetryConfig {
        let retry = &self.collector.retry;
        RetryConfig::new(
            Duration::from_millis(retry.initial_delay_ms),
            Duration::from_millis(retry.max_delay_ms),
        )
        .with_backoff_multiplier(retry.backoff_multiplier)
    }

    /// Pause before re-establishing a failed watch.
    pub fn watch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bridge.watch_retry_delay_ms)
    }

    /// Rooms to publish at startup.
    pub fn initial_rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().copied().map(RoomId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_colocated() {
        let config = ServiceConfig::from_json("{}").unwrap();
        assert_eq!(config.bridge_mode(), BridgeMode::Local);
        assert_eq!(config.log_level(), LogLevel::Info);
        assert_eq!(config.bridge.key_prefix, "room_");
        assert_eq!(config.retry_config(), RetryConfig::default());
    }

    #[test]
    fn split_deployment_needs_endpoints() {
        let err = ServiceConfig::from_json(r#"{"service": {"core": false, "collector": true}}"#)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));

        let config = ServiceConfig::from_json(
            r#"{"service": {"core": false, "collector": true}, "store_endpoints": ["10.0.0.1:2379"]}"#,
        )
        .unwrap();
        assert_eq!(config.bridge_mode(), BridgeMode::Distributed);
    }

    #[test]
    fn no_roles_is_rejected() {
        let err = ServiceConfig::from_json(r#"{"service": {"core": false, "collector": false}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("no service"));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let config = ServiceConfig::from_json(r#"{"log": {"level": "WARN"}}"#).unwrap();
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log_level(), LogLevel::Warn);

        let config = ServiceConfig::from_json(r#"{"log": {"level": "verbose"}}"#).unwrap();
        assert_eq!(config.log_level(), LogLevel::Info);
    }

    #[test]
    fn bad_retry_window_is_rejected() {
        let err = ServiceConfig::from_json(
            r#"{"collector": {"retry": {"initial_delay_ms": 5000, "max_delay_ms": 1000}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = ServiceConfig::from_json("{rooms: }").unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rooms": [3, 1, 2], "bridge": {{"key_prefix": "live/"}}}}"#).unwrap();

        let config = ServiceConfig::load(file.path()).unwrap();
        assert_eq!(config.initial_rooms(), vec![RoomId(3), RoomId(1), RoomId(2)]);
        assert_eq!(config.bridge.key_prefix, "live/");
        assert_eq!(config.bridge.watch_retry_delay_ms, 1000);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ServiceConfig::load("/nonexistent/roomkeeper.json").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
