use crate::config::DiscoverySettings;

/// The three MQTT topics used to announce one image.
///
/// All of them live under `{prefix}/{component}/{node_name}/`; the availability
/// topic is shared by every image announced by the same node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub availability: String,
    pub discovery: String,
    pub state: String,
}

impl Topics {
    /// Derives the topics for the image whose sanitized id is `image_id`.
    pub fn new(settings: &DiscoverySettings, image_id: &str) -> Self {
        let base = base_topic(settings);
        Self {
            availability: availability_topic(settings),
            discovery: format!("{base}/{image_id}/config"),
            state: format!("{base}/{image_id}/state"),
        }
    }
}

/// Availability topic of the node, also used for the last-will.
pub fn availability_topic(settings: &DiscoverySettings) -> String {
    format!("{}/availability", base_topic(settings))
}

fn base_topic(settings: &DiscoverySettings) -> String {
    format!(
        "{}/{}/{}",
        settings.prefix, settings.component, settings.node_name
    )
}
