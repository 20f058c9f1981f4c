//! Error types for feed ingestion.

use thiserror::Error;

/// Result type for feed client operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Result type for event sink writes.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for collector operations.
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors raised by a live feed connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Dialing the feed failed.
    #[error("dial failed: {0}")]
    Dial(String),

    /// The network connection broke.
    #[error("network error: {0}")]
    Network(String),

    /// The feed server closed the connection.
    #[error("server disconnected: {0}")]
    ServerDisconnect(String),
}

impl FeedError {
    /// Returns true if reconnecting may succeed.
    ///
    /// Every feed failure is transient to a session; it keeps retrying
    /// until it is stopped.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Dial(_) | FeedError::Network(_) | FeedError::ServerDisconnect(_) => true,
        }
    }
}

/// Errors raised by an event sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The backing storage rejected the write.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors surfaced by the collector.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// A session was started outside of a tokio runtime.
    #[error("no async runtime available to run feed sessions")]
    NoRuntime,

    /// An inbound payload could not be decoded.
    #[error("cannot decode {command} payload: {source}")]
    Decode {
        /// Wire name of the command.
        command: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_are_retryable() {
        assert!(FeedError::Dial("refused".into()).is_retryable());
        assert!(FeedError::Network("reset".into()).is_retryable());
        assert!(FeedError::ServerDisconnect("kicked".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            FeedError::Dial("connection refused".into()).to_string(),
            "dial failed: connection refused"
        );
        assert_eq!(
            SinkError::Storage("disk full".into()).to_string(),
            "storage error: disk full"
        );

        let source = serde_json::from_str::<u64>("x").unwrap_err();
        let err = CollectorError::Decode {
            command: "SEND_GIFT",
            source,
        };
        assert!(err.to_string().starts_with("cannot decode SEND_GIFT payload"));
    }
}
