//! Collector configuration.

use roomkeeper_core::{RetryConfig, ServiceConfig};

/// Configuration shared by every session of a collector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorConfig {
    /// Reconnect policy of each session.
    pub retry: RetryConfig,
}

impl CollectorConfig {
    /// Creates a configuration with the default reconnect policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnect policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl From<&ServiceConfig> for CollectorConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self::new().with_retry(config.retry_config())
    }
}
