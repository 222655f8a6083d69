//! The `utils` module provides a collection of utility functions and common
//! definitions used across the announcer.
//!
//! It centralizes the error types shared by the transport and notifier layers,
//! secret resolution for broker credentials, and logging initialisation.

pub mod error;
pub mod logging;
pub mod secret;

pub use error::{AnnounceError, SecretError, TransportError};
pub use secret::resolve_secret;
