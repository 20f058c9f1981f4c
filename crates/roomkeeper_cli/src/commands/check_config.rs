//! Check-config command implementation.

use roomkeeper_core::{BridgeMode, ServiceConfig};
use serde::Serialize;
use std::path::Path;

/// Resolved view of a configuration file.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    /// Configuration file path.
    pub path: String,
    /// Whether this process publishes membership.
    pub core: bool,
    /// Whether this process runs feed sessions.
    pub collector: bool,
    /// `local` or `distributed`.
    pub bridge_mode: String,
    /// Coordination store endpoints.
    pub store_endpoints: Vec<String>,
    /// Membership key prefix.
    pub key_prefix: String,
    /// Watch re-establishment delay in milliseconds.
    pub watch_retry_delay_ms: u64,
    /// Reconnect delays of the first attempts, in milliseconds.
    pub reconnect_delays_ms: Vec<u128>,
    /// Effective log level.
    pub log_level: String,
    /// Log file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    /// Rooms published at startup.
    pub rooms: Vec<u64>,
}

/// Builds the summary of a validated configuration.
pub fn summarize(path: &Path, config: &ServiceConfig) -> ConfigSummary {
    let bridge_mode = match config.bridge_mode() {
        BridgeMode::Local => "local",
        BridgeMode::Distributed => "distributed",
    };

    ConfigSummary {
        path: path.display().to_string(),
        core: config.service.core,
        collector: config.service.collector,
        bridge_mode: bridge_mode.to_string(),
        store_endpoints: config.store_endpoints.clone(),
        key_prefix: config.bridge.key_prefix.clone(),
        watch_retry_delay_ms: config.bridge.watch_retry_delay_ms,
        reconnect_delays_ms: config
            .retry_config()
            .backoff()
            .take(6)
            .map(|delay| delay.as_millis())
            .collect(),
        log_level: config.log_level().as_directive().to_string(),
        log_file: config.log.file.as_ref().map(|p| p.display().to_string()),
        rooms: config.rooms.clone(),
    }
}

/// Runs the check-config command.
///
/// The configuration was already loaded and validated by the caller.
pub fn run(
    path: &Path,
    config: &ServiceConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = summarize(path, config);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            println!("Configuration {} is valid", summary.path);
            println!();
            println!("Roles:            core={} collector={}", summary.core, summary.collector);
            println!("Bridge mode:      {}", summary.bridge_mode);
            if !summary.store_endpoints.is_empty() {
                println!("Store endpoints:  {}", summary.store_endpoints.join(", "));
            }
            println!("Key prefix:       {:?}", summary.key_prefix);
            println!("Watch retry:      {}ms", summary.watch_retry_delay_ms);
            let delays: Vec<String> = summary
                .reconnect_delays_ms
                .iter()
                .map(|ms| format!("{ms}ms"))
                .collect();
            println!("Reconnect delays: {}, ...", delays.join(", "));
            println!("Log level:        {}", summary.log_level);
            if let Some(file) = &summary.log_file {
                println!("Log file:         {}", file);
            }
            println!("Startup rooms:    {}", summary.rooms.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn summary_of_split_deployment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "service": {{ "core": false, "collector": true }},
                "store_endpoints": ["127.0.0.1:2379"],
                "log": {{ "level": "WARN" }},
                "rooms": [21452505, 7777]
            }}"#
        )
        .unwrap();

        let config = ServiceConfig::load(file.path()).unwrap();
        let summary = summarize(file.path(), &config);

        assert_eq!(summary.bridge_mode, "distributed");
        assert_eq!(summary.log_level, "warn");
        assert_eq!(summary.rooms, vec![21452505, 7777]);
        assert_eq!(
            summary.reconnect_delays_ms,
            vec![1000, 2000, 4000, 8000, 16000, 30000]
        );
    }

    #[test]
    fn json_output_skips_missing_log_file() {
        let config = ServiceConfig::default();
        let summary = summarize(Path::new("service.json"), &config);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["bridge_mode"], "local");
        assert!(json.get("log_file").is_none());
    }
}
