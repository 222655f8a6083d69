mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use settings::PartialSettings;

pub use settings::{DiscoverySettings, LogSettings, MqttSettings, Settings};

/// Prefix of the environment variables that override file settings,
/// e.g. `HASS_MQTT__HOST` or `HASS_DISCOVERY__NODE_NAME`.
pub const ENV_PREFIX: &str = "HASS";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a validated `Settings` struct
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Same as [`load_config`], but reads `path` instead of `config/default` when
/// given. An explicit file must exist.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__"),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge(Settings::default());
    validate(&settings)?;
    Ok(settings)
}

/// Rejects settings the announcer cannot work with.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    let mqtt = &settings.mqtt;

    if mqtt.qos > 2 {
        return Err(ConfigError::Message(format!(
            "mqtt.qos must be 0, 1 or 2, got {}",
            mqtt.qos
        )));
    }
    if !matches!(
        mqtt.scheme.as_str(),
        "mqtt" | "tcp" | "mqtts" | "ssl" | "tls"
    ) {
        return Err(ConfigError::Message(format!(
            "unsupported mqtt.scheme '{}'",
            mqtt.scheme
        )));
    }
    if mqtt.timeout_secs == 0 {
        return Err(ConfigError::Message(
            "mqtt.timeout_secs must be greater than zero".to_string(),
        ));
    }

    let required = [
        ("mqtt.host", mqtt.host.as_str()),
        ("mqtt.client_id", mqtt.client_id.as_str()),
        ("discovery.prefix", settings.discovery.prefix.as_str()),
        ("discovery.component", settings.discovery.component.as_str()),
        ("discovery.node_name", settings.discovery.node_name.as_str()),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::Message(format!("{key} must not be empty")));
        }
    }

    Ok(())
}
