//! The `discovery` module implements the Home Assistant MQTT discovery
//! protocol used to surface image updates.
//!
//! Everything here is pure: the same update event and settings always yield
//! the same topics and payloads, so republishing discovery is idempotent.
//!
//! - `image`: parsing and sanitizing image references and digests.
//! - `topic`: derivation of the availability, discovery and state topics.
//! - `message`: the JSON payload shapes.

pub mod image;
pub mod message;
pub mod topic;

use crate::config::DiscoverySettings;
use crate::notifier::UpdateEvent;
use message::{Device, DiscoveryPayload, ICON, StatePayload};

pub use topic::{Topics, availability_topic};

/// Topics and encoded payloads for one announce cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Sanitized repository path, used as unique id and topic segment.
    pub image_id: String,
    pub topics: Topics,
    pub discovery: Vec<u8>,
    pub state: Vec<u8>,
}

impl Announcement {
    /// Builds the announcement for `event`.
    ///
    /// Fails only if a payload cannot be encoded to JSON.
    pub fn build(
        event: &UpdateEvent,
        settings: &DiscoverySettings,
    ) -> Result<Self, serde_json::Error> {
        let repository = image::repository_path(&event.image);
        let image_id = image::sanitize(repository);
        let topics = Topics::new(settings, &image_id);

        let discovery = DiscoveryPayload {
            availability_topic: topics.availability.clone(),
            device: Device::for_node(&settings.node_name),
            icon: ICON.to_string(),
            name: image::display_name(repository).to_string(),
            state_topic: topics.state.clone(),
            title: event.image.clone(),
            unique_id: image_id.clone(),
        };

        Ok(Self {
            discovery: serde_json::to_vec(&discovery)?,
            state: serde_json::to_vec(&state_payload(event))?,
            image_id,
            topics,
        })
    }
}

/// State payload for `event`.
///
/// A first-seen image (no previous digest) reports itself as installed at the
/// latest version.
pub fn state_payload(event: &UpdateEvent) -> StatePayload {
    let latest = image::short_digest(&event.digest);
    let installed = if event.previous_digest.is_empty() {
        latest
    } else {
        image::short_digest(&event.previous_digest)
    };

    StatePayload {
        installed_version: installed.to_string(),
        latest_version: latest.to_string(),
    }
}
