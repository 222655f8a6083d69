//! # hass-announcer
//!
//! `hass-announcer` is the Home Assistant notification backend of a
//! container-image update watcher. For every detected image update it publishes
//! MQTT discovery and state messages so Home Assistant surfaces a
//! "new image version available" update entity.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `config`: Handles loading and validating the broker and discovery configuration.
//! - `discovery`: Pure topic and payload construction for MQTT discovery.
//! - `notifier`: The update event and the announcer that owns the broker connection.
//! - `transport`: The connect/publish seam, backed by `rumqttc` or by an in-memory recorder.
//! - `utils`: Shared utilities, such as error types, secrets and logging.

pub mod config;
pub mod discovery;
pub mod notifier;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
