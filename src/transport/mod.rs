//! The `transport` module is responsible for talking to the MQTT broker.
//!
//! The announcer only needs two capabilities, connecting and publishing, so
//! they are exposed as the [`Connector`] and [`Connection`] traits:
//!
//! - `mqtt`: the `rumqttc` backed implementation used against a real broker.
//! - `memory`: an in-memory implementation that records every call, used for
//!   dry runs and tests.

pub mod memory;
pub mod mqtt;

use std::future::Future;
use std::time::Duration;

use crate::config::MqttSettings;
use crate::utils::TransportError;

pub use memory::MemoryConnector;
pub use mqtt::MqttConnector;

/// Quality of Service levels for MQTT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// At most once delivery (fire and forget)
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(other),
        }
    }
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Message the broker publishes on the client's behalf after an unclean
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Everything needed to open one broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Empty when the broker does not require authentication.
    pub username: String,
    pub password: String,
    pub will: Will,
    pub keep_alive: Duration,
    /// Bound for the CONNACK wait and for each publish acknowledgment.
    pub timeout: Duration,
}

impl ConnectOptions {
    /// Options for `settings`, with already resolved credentials.
    pub fn new(settings: &MqttSettings, username: String, password: String, will: Will) -> Self {
        Self {
            scheme: settings.scheme.clone(),
            host: settings.host.clone(),
            port: settings.port,
            client_id: settings.client_id.clone(),
            username,
            password,
            will,
            keep_alive: Duration::from_secs(settings.keep_alive_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Broker URL in `scheme://host:port` form.
    pub fn broker_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Opens broker connections.
pub trait Connector: Send + Sync {
    type Connection: Connection;

    /// Connect to the broker and wait until the connection is accepted.
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// An established broker connection.
pub trait Connection: Send + Sync {
    /// Publish `payload` to `topic` and wait until it is delivered at `qos`.
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the connection is still usable.
    fn is_connected(&self) -> bool;

    /// Disconnect cleanly; the broker does not publish the will.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests;
