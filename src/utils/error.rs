//! The `error` module defines the error types used within the announcer.
//!
//! Errors are propagated verbatim to the caller of
//! [`HomeAssistant::announce`](crate::notifier::HomeAssistant::announce),
//! which owns any retry policy.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to resolve a credential from its inline value or file reference.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secret file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a [`Connector`](crate::transport::Connector) or an
/// established [`Connection`](crate::transport::Connection).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported broker scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection refused by broker: {0}")]
    Refused(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("disconnect failed: {0}")]
    Disconnect(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("connection lost")]
    ConnectionLost,
}

/// Errors returned by a single announce cycle.
#[derive(Debug, Error)]
pub enum AnnounceError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("failed to connect to MQTT broker {broker}: {source}")]
    Connect {
        broker: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to publish to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to disconnect from MQTT broker: {0}")]
    Disconnect(#[source] TransportError),

    #[error("failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),
}
