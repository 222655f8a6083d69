//! In-memory transport.
//!
//! Records every connect, publish and disconnect instead of talking to a
//! broker. The CLI uses it for `--dry-run`; tests use it to assert on the exact
//! sequence of calls and to inject failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::{ConnectOptions, Connection, Connector, QoS};
use crate::utils::TransportError;

/// A message handed to [`MemoryConnection::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl Published {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// One recorded transport call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ConnectOptions),
    Publish(Published),
    Disconnect,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    failing_connects: usize,
    failing_topic: Option<String>,
    links: Vec<Arc<AtomicBool>>,
}

/// Connector whose connections record calls into a shared log.
///
/// Clones share the same log, so a test can keep one clone and hand the other
/// to the announcer.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<State>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Recorded publishes only.
    pub fn published(&self) -> Vec<Published> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Publish(published) => Some(published.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of connect attempts, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Connect(_)))
            .count()
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_connects(&self, count: usize) {
        self.state().failing_connects = count;
    }

    /// Makes every publish to a topic ending with `suffix` fail.
    pub fn fail_publish_to(&self, suffix: &str) {
        self.state().failing_topic = Some(suffix.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_connects = 0;
        state.failing_topic = None;
    }

    /// Marks every connection handed out so far as lost.
    pub fn drop_connections(&self) {
        for link in &self.state().links {
            link.store(false, Ordering::SeqCst);
        }
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, options: &ConnectOptions) -> Result<MemoryConnection, TransportError> {
        let mut state = self.state();
        state.calls.push(Call::Connect(options.clone()));

        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::Connect(format!(
                "{} unreachable",
                options.broker_url()
            )));
        }

        info!(broker = %options.broker_url(), "Dry run: connected");
        let connected = Arc::new(AtomicBool::new(true));
        state.links.push(connected.clone());

        Ok(MemoryConnection {
            state: self.state.clone(),
            connected,
        })
    }
}

/// Connection handed out by [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
    connected: Arc<AtomicBool>,
}

impl Connection for MemoryConnection {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionLost);
        }

        let published = Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        };
        info!(
            topic,
            retain,
            payload = published.payload_str(),
            "Dry run: publish"
        );

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.calls.push(Call::Publish(published));
        match &state.failing_topic {
            Some(suffix) if topic.ends_with(suffix.as_str()) => {
                Err(TransportError::Publish(format!("rejected by broker: {topic}")))
            }
            _ => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .push(Call::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
