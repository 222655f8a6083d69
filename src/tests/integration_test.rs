use std::sync::{Arc, Mutex};

use crate::config::Settings;
use crate::notifier::{HomeAssistant, UpdateEvent};
use crate::transport::{ConnectOptions, Connection, Connector, QoS};
use crate::utils::{AnnounceError, TransportError};

type Log = Arc<Mutex<Vec<String>>>;

/// Connector that writes a one-line description of every call to a log.
#[derive(Clone, Default)]
struct ScriptedConnector {
    log: Log,
    refuse: bool,
}

struct ScriptedConnection {
    log: Log,
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn connect(&self, options: &ConnectOptions) -> Result<ScriptedConnection, TransportError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("connect {} as {}", options.broker_url(), options.client_id));
        if self.refuse {
            return Err(TransportError::Refused("NotAuthorized".to_string()));
        }
        Ok(ScriptedConnection {
            log: self.log.clone(),
        })
    }
}

impl Connection for ScriptedConnection {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(format!(
            "publish {topic} qos={} retain={retain} {}",
            qos as u8,
            String::from_utf8_lossy(payload)
        ));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.log.lock().unwrap().push("disconnect".to_string());
        Ok(())
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.mqtt.host = "broker.lan".to_string();
    settings.mqtt.client_id = "diun".to_string();
    settings.mqtt.qos = 1;
    settings.discovery.node_name = "diun".to_string();
    settings
}

#[tokio::test]
async fn announces_update_then_goes_offline() {
    let connector = ScriptedConnector::default();
    let log = connector.log.clone();
    let notifier = HomeAssistant::new(&settings(), connector).unwrap();

    notifier
        .announce(&UpdateEvent::new(
            "docker.io/library/nginx:latest",
            "sha256:1111111122222222",
            "",
        ))
        .await
        .unwrap();
    notifier.shutdown().await.unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 6);
    assert_eq!(log[0], "connect mqtt://broker.lan:1883 as diun");
    assert_eq!(
        log[1],
        "publish homeassistant/update/diun/availability qos=1 retain=true online"
    );
    assert!(log[2].starts_with(
        "publish homeassistant/update/diun/docker-io-library-nginx/config qos=1 retain=true {"
    ));
    assert!(log[2].contains(r#""unique_id":"docker-io-library-nginx""#));
    assert_eq!(
        log[3],
        r#"publish homeassistant/update/diun/docker-io-library-nginx/state qos=1 retain=true {"installed_version":"22222222","latest_version":"22222222"}"#
    );
    assert_eq!(
        log[4],
        "publish homeassistant/update/diun/availability qos=1 retain=true offline"
    );
    assert_eq!(log[5], "disconnect");
}

#[tokio::test]
async fn refused_connection_surfaces_as_connect_error() {
    let connector = ScriptedConnector {
        refuse: true,
        ..Default::default()
    };
    let log = connector.log.clone();
    let notifier = HomeAssistant::new(&settings(), connector).unwrap();

    let err = notifier
        .announce(&UpdateEvent::new("alpine:3.20", "sha256:0011223344556677", ""))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnnounceError::Connect {
            source: TransportError::Refused(_),
            ..
        }
    ));
    assert!(err.to_string().contains("mqtt://broker.lan:1883"));
    assert_eq!(log.lock().unwrap().len(), 1);
}
