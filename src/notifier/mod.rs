//! The `notifier` module turns detected image updates into Home Assistant
//! entities.
//!
//! - `event`: the `UpdateEvent` handed in by the update watcher.
//! - `homeassistant`: the announcer that owns the broker connection and
//!   publishes availability, discovery and state.

pub mod event;
pub mod homeassistant;

pub use event::UpdateEvent;
pub use homeassistant::HomeAssistant;
