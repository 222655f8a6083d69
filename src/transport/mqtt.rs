//! `rumqttc` backed transport.
//!
//! `rumqttc` only makes progress while its `EventLoop` is polled. Once the
//! CONNACK is received the loop is moved to a background task that keeps the
//! session alive (pings, acknowledgments) and reports publish progress back to
//! the connection, so a publish can wait until it is actually delivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet,
    Transport,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::{ConnectOptions, Connection, Connector, QoS};
use crate::utils::TransportError;

const REQUESTS_CAP: usize = 10;

/// Interval used while waiting for the event loop to flush a DISCONNECT.
const DISCONNECT_POLL: Duration = Duration::from_millis(20);

/// Publish progress reported by the event loop task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// A PUBLISH with this packet id was written to the network.
    Written(u16),
    /// PUBACK (QoS 1) or PUBCOMP (QoS 2) received for this packet id.
    Acked(u16),
}

/// Connects to a real broker with `rumqttc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttConnector;

impl MqttConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MqttConnector {
    type Connection = MqttConnection;

    async fn connect(&self, options: &ConnectOptions) -> Result<MqttConnection, TransportError> {
        let broker = options.broker_url();
        let (client, mut eventloop) = AsyncClient::new(mqtt_options(options)?, REQUESTS_CAP);

        info!(%broker, client_id = %options.client_id, "Connecting to MQTT broker");
        timeout(options.timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| TransportError::Timeout(options.timeout.as_secs()))??;
        info!(%broker, "Connected to MQTT broker");

        let connected = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(eventloop, tx, connected.clone(), broker));

        Ok(MqttConnection {
            client,
            deliveries: Mutex::new(rx),
            connected,
            timeout: options.timeout,
            task,
        })
    }
}

/// Translates connect options into `rumqttc` options.
pub fn mqtt_options(options: &ConnectOptions) -> Result<MqttOptions, TransportError> {
    let mut mqtt = MqttOptions::new(&options.client_id, &options.host, options.port);
    mqtt.set_keep_alive(options.keep_alive);
    if !options.username.is_empty() {
        mqtt.set_credentials(&options.username, &options.password);
    }
    mqtt.set_last_will(LastWill::new(
        &options.will.topic,
        options.will.payload.as_bytes().to_vec(),
        options.will.qos.into(),
        options.will.retain,
    ));
    mqtt.set_transport(build_transport(&options.scheme)?);
    Ok(mqtt)
}

fn build_transport(scheme: &str) -> Result<Transport, TransportError> {
    match scheme {
        "mqtt" | "tcp" => Ok(Transport::tcp()),
        "mqtts" | "ssl" | "tls" => Ok(Transport::tls_with_default_config()),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(TransportError::Refused(format!("{code:?}"))),
                };
            }
            Ok(event) => trace!(?event, "MQTT event before CONNACK"),
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

/// Polls the event loop until the connection ends.
///
/// The loop is not polled again after an error: `rumqttc` would reconnect on
/// its own, but reconnecting is left to the announcer.
async fn drive(
    mut eventloop: EventLoop,
    deliveries: mpsc::UnboundedSender<Delivery>,
    connected: Arc<AtomicBool>,
    broker: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                let _ = deliveries.send(Delivery::Written(pkid));
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                let _ = deliveries.send(Delivery::Acked(ack.pkid));
            }
            Ok(Event::Incoming(Packet::PubComp(comp))) => {
                let _ = deliveries.send(Delivery::Acked(comp.pkid));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(%broker, "Disconnected from MQTT broker");
                break;
            }
            Ok(event) => trace!(?event, "MQTT event"),
            Err(e) => {
                warn!(%broker, error = %e, "MQTT connection lost");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Waits until the next publish reaches the delivery point required by `qos`.
async fn wait_for_delivery(
    deliveries: &mut mpsc::UnboundedReceiver<Delivery>,
    qos: QoS,
) -> Result<(), TransportError> {
    let mut pending = None;
    while let Some(delivery) = deliveries.recv().await {
        match delivery {
            Delivery::Written(_) if qos == QoS::AtMostOnce => return Ok(()),
            Delivery::Written(pkid) => pending = Some(pkid),
            Delivery::Acked(pkid) if pending == Some(pkid) => return Ok(()),
            Delivery::Acked(_) => {}
        }
    }
    Err(TransportError::ConnectionLost)
}

/// A live `rumqttc` session.
///
/// Dropping it aborts the event loop without a DISCONNECT, so the broker
/// publishes the will.
pub struct MqttConnection {
    client: AsyncClient,
    /// Locked for the whole publish, which keeps one publish in flight.
    deliveries: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    connected: Arc<AtomicBool>,
    timeout: Duration,
    task: JoinHandle<()>,
}

impl Connection for MqttConnection {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionLost);
        }

        let mut deliveries = self.deliveries.lock().await;
        // Reports no earlier publish consumed.
        while deliveries.try_recv().is_ok() {}

        self.client
            .publish(topic, qos.into(), retain, payload.to_vec())
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        debug!(topic, qos = qos as u8, retain, "Publish queued");

        match timeout(self.timeout, wait_for_delivery(&mut deliveries, qos)).await {
            Ok(delivered) => delivered,
            Err(_) => {
                // A late report for this publish would be taken for the next one.
                warn!(topic, "Publish not acknowledged in time, dropping connection");
                self.mark_lost();
                Err(TransportError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Ok(());
        }

        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))?;

        let flushed = async {
            while !self.task.is_finished() {
                tokio::time::sleep(DISCONNECT_POLL).await;
            }
        };
        timeout(self.timeout, flushed)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_secs()))
    }
}

impl MqttConnection {
    fn mark_lost(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Will;

    fn options(scheme: &str) -> ConnectOptions {
        ConnectOptions {
            scheme: scheme.to_string(),
            host: "localhost".to_string(),
            port: 1883,
            client_id: "test".to_string(),
            username: String::new(),
            password: String::new(),
            will: Will {
                topic: "homeassistant/update/node/availability".to_string(),
                payload: "offline".to_string(),
                qos: QoS::AtLeastOnce,
                retain: true,
            },
            keep_alive: Duration::from_secs(30),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_mqtt_options_carry_will_and_client_id() {
        let mqtt = mqtt_options(&options("mqtt")).unwrap();
        assert_eq!(mqtt.client_id(), "test");
        assert_eq!(mqtt.broker_address(), ("localhost".to_string(), 1883));
        let will = mqtt.last_will().expect("will is set");
        assert_eq!(will.topic, "homeassistant/update/node/availability");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
        assert_eq!(will.qos, rumqttc::QoS::AtLeastOnce);
    }

    #[test]
    fn test_mqtt_options_credentials_only_with_username() {
        let mqtt = mqtt_options(&options("mqtt")).unwrap();
        assert!(mqtt.credentials().is_none());

        let mut opts = options("mqtt");
        opts.username = "ha".to_string();
        opts.password = "pw".to_string();
        let mqtt = mqtt_options(&opts).unwrap();
        assert_eq!(
            mqtt.credentials(),
            Some(("ha".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = mqtt_options(&options("ws")).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(s) if s == "ws"));
    }

    #[tokio::test]
    async fn test_qos0_completes_when_written() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Delivery::Written(0)).unwrap();
        assert!(wait_for_delivery(&mut rx, QoS::AtMostOnce).await.is_ok());
    }

    #[tokio::test]
    async fn test_qos1_waits_for_matching_ack() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Delivery::Acked(3)).unwrap();
        tx.send(Delivery::Written(7)).unwrap();
        tx.send(Delivery::Acked(6)).unwrap();
        tx.send(Delivery::Acked(7)).unwrap();
        drop(tx);
        assert!(wait_for_delivery(&mut rx, QoS::AtLeastOnce).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_event_loop_is_connection_lost() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Delivery::Written(1)).unwrap();
        drop(tx);
        let err = wait_for_delivery(&mut rx, QoS::ExactlyOnce).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_late_report_after_timeout_does_not_complete_next_publish() {
        let (client, _eventloop) = AsyncClient::new(mqtt_options(&options("mqtt")).unwrap(), 10);
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = MqttConnection {
            client,
            deliveries: Mutex::new(rx),
            connected: Arc::new(AtomicBool::new(true)),
            timeout: Duration::from_millis(50),
            task: tokio::spawn(std::future::pending::<()>()),
        };

        let first = connection
            .publish("node/app/config", b"{}", QoS::AtLeastOnce, true)
            .await;
        assert!(matches!(first, Err(TransportError::Timeout(_))));
        assert!(!connection.is_connected());

        // The event loop reports the first publish only now.
        tx.send(Delivery::Written(1)).unwrap();
        tx.send(Delivery::Acked(1)).unwrap();

        let second = connection
            .publish("node/app/state", b"{}", QoS::AtLeastOnce, true)
            .await;
        assert!(matches!(second, Err(TransportError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut opts = options("mqtt");
        opts.host = "127.0.0.1".to_string();
        opts.port = port;

        let result = MqttConnector::new().connect(&opts).await;
        assert!(matches!(
            result,
            Err(TransportError::Connect(_) | TransportError::Timeout(_))
        ));
    }
}
