use serde::Serialize;

/// Icon shown by Home Assistant for every announced image.
pub const ICON: &str = "mdi:docker";

/// Manufacturer reported on the device that groups all image entities.
pub const MANUFACTURER: &str = "DIUN - Docker Image Update Notifier";

/// Retained payload published on the availability topic once connected.
pub const ONLINE: &str = "online";

/// Last-will payload, also published on a clean shutdown.
pub const OFFLINE: &str = "offline";

/// Discovery descriptor of an `update` entity.
///
/// Fields are declared in key order so the encoded JSON is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryPayload {
    pub availability_topic: String,
    pub device: Device,
    pub icon: String,
    pub name: String,
    pub state_topic: String,
    pub title: String,
    pub unique_id: String,
}

/// Device grouping the entities announced by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub identifiers: String,
    pub manufacturer: String,
    pub name: String,
}

impl Device {
    pub fn for_node(node_name: &str) -> Self {
        Self {
            identifiers: node_name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            name: node_name.to_string(),
        }
    }
}

/// State of an `update` entity: both versions are shortened digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatePayload {
    pub installed_version: String,
    pub latest_version: String,
}
