use super::memory::{Call, MemoryConnector};
use super::{ConnectOptions, Connection, Connector, QoS, Will};
use crate::config::Settings;
use crate::utils::TransportError;
use std::time::Duration;

fn connect_options() -> ConnectOptions {
    let settings = Settings::default();
    ConnectOptions::new(
        &settings.mqtt,
        "user".to_string(),
        "secret".to_string(),
        Will {
            topic: "homeassistant/update/hass-announcer/availability".to_string(),
            payload: "offline".to_string(),
            qos: QoS::AtMostOnce,
            retain: true,
        },
    )
}

#[test]
fn test_qos_from_level() {
    assert_eq!(QoS::try_from(0), Ok(QoS::AtMostOnce));
    assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
    assert_eq!(QoS::try_from(2), Ok(QoS::ExactlyOnce));
    assert_eq!(QoS::try_from(3), Err(3));
}

#[test]
fn test_qos_into_rumqttc() {
    assert_eq!(rumqttc::QoS::from(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
}

#[test]
fn test_connect_options_from_settings() {
    let options = connect_options();
    assert_eq!(options.broker_url(), "mqtt://localhost:1883");
    assert_eq!(options.client_id, "hass-announcer");
    assert_eq!(options.keep_alive, Duration::from_secs(30));
    assert_eq!(options.timeout, Duration::from_secs(10));
    assert_eq!(options.username, "user");
}

#[tokio::test]
async fn test_memory_connector_records_calls_in_order() {
    let connector = MemoryConnector::new();
    let connection = connector.connect(&connect_options()).await.unwrap();

    connection
        .publish("a/availability", b"online", QoS::AtLeastOnce, true)
        .await
        .unwrap();
    connection.disconnect().await.unwrap();

    let calls = connector.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(&calls[0], Call::Connect(opts) if opts.client_id == "hass-announcer"));
    assert!(matches!(&calls[1], Call::Publish(p) if p.payload_str() == "online" && p.retain));
    assert_eq!(calls[2], Call::Disconnect);
    assert!(!connection.is_connected());
}

#[tokio::test]
async fn test_memory_connector_injected_connect_failure() {
    let connector = MemoryConnector::new();
    connector.fail_connects(1);

    let first = connector.connect(&connect_options()).await;
    assert!(matches!(first, Err(TransportError::Connect(_))));

    let second = connector.connect(&connect_options()).await;
    assert!(second.is_ok());
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn test_memory_connector_injected_publish_failure() {
    let connector = MemoryConnector::new();
    connector.fail_publish_to("/config");
    let connection = connector.connect(&connect_options()).await.unwrap();

    assert!(connection
        .publish("x/state", b"{}", QoS::AtMostOnce, true)
        .await
        .is_ok());
    assert!(matches!(
        connection
            .publish("x/config", b"{}", QoS::AtMostOnce, true)
            .await,
        Err(TransportError::Publish(_))
    ));

    connector.clear_failures();
    assert!(connection
        .publish("x/config", b"{}", QoS::AtMostOnce, true)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_dropped_memory_connection_refuses_publish() {
    let connector = MemoryConnector::new();
    let connection = connector.connect(&connect_options()).await.unwrap();
    connector.drop_connections();

    assert!(!connection.is_connected());
    let result = connection
        .publish("x/state", b"{}", QoS::AtMostOnce, true)
        .await;
    assert!(matches!(result, Err(TransportError::ConnectionLost)));
    assert!(connector.published().is_empty());
}
