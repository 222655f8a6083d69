use serde::{Deserialize, Serialize};

/// A detected image update, as handed over by the update watcher.
///
/// `previous_digest` is empty for an image seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Full image reference, e.g. `docker.io/library/nginx:latest`.
    pub image: String,
    /// Digest of the newly published manifest.
    pub digest: String,
    #[serde(default)]
    pub previous_digest: String,
}

impl UpdateEvent {
    pub fn new(
        image: impl Into<String>,
        digest: impl Into<String>,
        previous_digest: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            digest: digest.into(),
            previous_digest: previous_digest.into(),
        }
    }

    pub fn is_first_seen(&self) -> bool {
        self.previous_digest.is_empty()
    }
}
