//! Home Assistant announcer
//!
//! `HomeAssistant` publishes each update as an MQTT discovery `update` entity.
//! It owns at most one broker connection, opened lazily on the first announce
//! and reused afterwards:
//!
//! 1. resolve credentials (before any network activity),
//! 2. connect and publish `online` on the availability topic, first call only,
//! 3. publish the discovery descriptor,
//! 4. publish the state.
//!
//! Every step fails fast and the first error is returned; retrying is the
//! caller's decision. The connection slot stays locked for the whole announce,
//! so concurrent callers are serialized and never race on the first connect.

use config::ConfigError;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::UpdateEvent;
use crate::config::{DiscoverySettings, MqttSettings, Settings};
use crate::discovery::message::{OFFLINE, ONLINE};
use crate::discovery::{Announcement, availability_topic};
use crate::transport::{ConnectOptions, Connection, Connector, QoS, Will};
use crate::utils::{AnnounceError, resolve_secret};

pub struct HomeAssistant<C: Connector> {
    mqtt: MqttSettings,
    discovery: DiscoverySettings,
    qos: QoS,
    connector: C,
    connection: Mutex<Option<C::Connection>>,
}

impl<C: Connector> HomeAssistant<C> {
    /// Creates an announcer; no connection is opened until the first announce.
    pub fn new(settings: &Settings, connector: C) -> Result<Self, ConfigError> {
        let qos = QoS::try_from(settings.mqtt.qos).map_err(|level| {
            ConfigError::Message(format!("mqtt.qos must be 0, 1 or 2, got {level}"))
        })?;

        Ok(Self {
            mqtt: settings.mqtt.clone(),
            discovery: settings.discovery.clone(),
            qos,
            connector,
            connection: Mutex::new(None),
        })
    }

    /// Name of this notifier, as shown in the watcher's logs.
    pub fn name(&self) -> &'static str {
        "homeassistant"
    }

    /// Publishes `event` as a Home Assistant update entity.
    ///
    /// A connection found dead is dropped and replaced by a new one, which
    /// publishes `online` again.
    #[instrument(skip_all, fields(image = %event.image))]
    pub async fn announce(&self, event: &UpdateEvent) -> Result<(), AnnounceError> {
        let username = resolve_secret(&self.mqtt.username, self.mqtt.username_file.as_deref())?;
        let password = resolve_secret(&self.mqtt.password, self.mqtt.password_file.as_deref())?;
        let announcement = Announcement::build(event, &self.discovery)?;
        let topics = &announcement.topics;

        let mut slot = self.connection.lock().await;
        if slot.as_ref().is_some_and(|connection| !connection.is_connected()) {
            warn!("MQTT connection lost, reconnecting");
            *slot = None;
        }
        let connection = match slot.take() {
            Some(connection) => connection,
            None => self.open(username, password, &topics.availability).await?,
        };
        let connection = slot.insert(connection);

        self.publish(connection, &topics.discovery, &announcement.discovery)
            .await?;
        self.publish(connection, &topics.state, &announcement.state)
            .await?;

        info!(
            unique_id = %announcement.image_id,
            first_seen = event.is_first_seen(),
            "Announced image update to Home Assistant"
        );
        Ok(())
    }

    /// Marks the node offline and disconnects cleanly.
    ///
    /// Does nothing when no live connection exists.
    pub async fn shutdown(&self) -> Result<(), AnnounceError> {
        let Some(connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        if !connection.is_connected() {
            return Ok(());
        }

        let availability = availability_topic(&self.discovery);
        self.publish(&connection, &availability, OFFLINE.as_bytes())
            .await?;
        connection
            .disconnect()
            .await
            .map_err(AnnounceError::Disconnect)?;
        info!("Disconnected from MQTT broker");
        Ok(())
    }

    /// Whether a live connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|connection| connection.is_connected())
    }

    /// Connects with a retained `offline` will and announces the node online.
    ///
    /// The connection is only returned once `online` went out, so a failure
    /// here leaves nothing behind and the next call starts over.
    async fn open(
        &self,
        username: String,
        password: String,
        availability: &str,
    ) -> Result<C::Connection, AnnounceError> {
        let will = Will {
            topic: availability.to_string(),
            payload: OFFLINE.to_string(),
            qos: self.qos,
            retain: true,
        };
        let options = ConnectOptions::new(&self.mqtt, username, password, will);

        let connection = self
            .connector
            .connect(&options)
            .await
            .map_err(|source| AnnounceError::Connect {
                broker: options.broker_url(),
                source,
            })?;

        self.publish(&connection, availability, ONLINE.as_bytes())
            .await?;
        Ok(connection)
    }

    async fn publish(
        &self,
        connection: &C::Connection,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), AnnounceError> {
        debug!(topic, bytes = payload.len(), "Publishing");
        connection
            .publish(topic, payload, self.qos, true)
            .await
            .map_err(|source| AnnounceError::Publish {
                topic: topic.to_string(),
                source,
            })
    }
}
