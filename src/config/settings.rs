use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes the broker connection, the Home Assistant discovery layout and
/// logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub mqtt: MqttSettings,
    pub discovery: DiscoverySettings,
    pub log: LogSettings,
}

/// Connection settings for the MQTT broker.
///
/// `username`/`password` may be given inline or through the matching `*_file`
/// reference; an inline value wins when both are set.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MqttSettings {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub username_file: Option<PathBuf>,
    pub password: String,
    pub password_file: Option<PathBuf>,
    /// QoS level (0, 1 or 2) used for every publish and for the last-will.
    pub qos: u8,
    pub keep_alive_secs: u64,
    /// Upper bound for the CONNACK wait and for each publish acknowledgment.
    pub timeout_secs: u64,
}

/// Layout of the Home Assistant discovery topics.
///
/// Every topic lives under `{prefix}/{component}/{node_name}/`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DiscoverySettings {
    pub prefix: String,
    pub component: String,
    pub node_name: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub mqtt: Option<PartialMqttSettings>,
    pub discovery: Option<PartialDiscoverySettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialMqttSettings {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub username_file: Option<PathBuf>,
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,
    pub qos: Option<u8>,
    pub keep_alive_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialDiscoverySettings {
    pub prefix: Option<String>,
    pub component: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Targets a local, unauthenticated broker and the stock Home Assistant
/// discovery prefix.
impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings {
                scheme: "mqtt".to_string(),
                host: "localhost".to_string(),
                port: 1883,
                client_id: "hass-announcer".to_string(),
                username: String::new(),
                username_file: None,
                password: String::new(),
                password_file: None,
                qos: 0,
                keep_alive_secs: 30,
                timeout_secs: 10,
            },
            discovery: DiscoverySettings {
                prefix: "homeassistant".to_string(),
                component: "update".to_string(),
                node_name: "hass-announcer".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every value missing from `self` with the one from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let mqtt = self.mqtt.unwrap_or_default();
        let discovery = self.discovery.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            mqtt: MqttSettings {
                scheme: mqtt.scheme.unwrap_or(default.mqtt.scheme),
                host: mqtt.host.unwrap_or(default.mqtt.host),
                port: mqtt.port.unwrap_or(default.mqtt.port),
                client_id: mqtt.client_id.unwrap_or(default.mqtt.client_id),
                username: mqtt.username.unwrap_or(default.mqtt.username),
                username_file: mqtt.username_file.or(default.mqtt.username_file),
                password: mqtt.password.unwrap_or(default.mqtt.password),
                password_file: mqtt.password_file.or(default.mqtt.password_file),
                qos: mqtt.qos.unwrap_or(default.mqtt.qos),
                keep_alive_secs: mqtt.keep_alive_secs.unwrap_or(default.mqtt.keep_alive_secs),
                timeout_secs: mqtt.timeout_secs.unwrap_or(default.mqtt.timeout_secs),
            },
            discovery: DiscoverySettings {
                prefix: discovery.prefix.unwrap_or(default.discovery.prefix),
                component: discovery.component.unwrap_or(default.discovery.component),
                node_name: discovery.node_name.unwrap_or(default.discovery.node_name),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
