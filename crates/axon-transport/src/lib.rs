pub mod backoff;
pub mod error;
pub mod loopback;
pub mod state;
pub mod ws;

use axon_bus::{EventBus, Subscription, Topic};
use axon_schema::{ConnectionState, TransportEvent, WireFrame};
use tokio::sync::watch;

pub use backoff::reconnect_delay_ms;
pub use error::{Result, TransportError};
pub use loopback::LoopbackTransport;
pub use state::{next_state, Signal};
pub use ws::{ReconnectConfig, WsConfig, WsTransport};

/// A shared, process-wide chat connection.
///
/// Consumers attach listeners with [`ChatTransport::subscribe`] and detach by
/// dropping the returned [`Subscription`]. They never open or close the
/// connection themselves.
pub trait ChatTransport: Send + Sync {
    fn state(&self) -> ConnectionState;

    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    fn subscribe(&self, topics: &[Topic]) -> Subscription;

    /// Queue `frame` for delivery. Returns `false` without sending anything
    /// when the transport is not connected.
    fn emit(&self, frame: WireFrame) -> bool;
}

/// Connection state plus the listener bus, shared by transport
/// implementations.
pub(crate) struct ConnectionCell {
    state: watch::Sender<ConnectionState>,
    bus: EventBus,
}

impl ConnectionCell {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            bus: EventBus::new(),
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe(&self, topics: &[Topic]) -> Subscription {
        self.bus.subscribe(topics)
    }

    /// Apply `signal`; on a valid transition, announce it to listeners.
    /// Returns whether the state changed.
    pub(crate) fn apply(&self, signal: Signal, reason: Option<String>) -> bool {
        let mut changed = None;
        self.state.send_if_modified(|state| match next_state(*state, signal) {
            Some(next) => {
                changed = Some((*state, next));
                *state = next;
                true
            }
            None => false,
        });

        let Some((from, to)) = changed else {
            tracing::debug!(?signal, state = %self.current(), "ignored connection signal");
            return false;
        };
        tracing::debug!(%from, %to, "connection state changed");

        match signal {
            Signal::Attempt => {}
            Signal::Opened => {
                self.bus.publish(TransportEvent::Connected);
            }
            Signal::Closed => {
                self.bus.publish(TransportEvent::Disconnected);
            }
            Signal::Failed => {
                self.bus.publish(TransportEvent::Failed {
                    reason: reason.unwrap_or_else(|| "transport failure".to_string()),
                });
            }
        }
        true
    }

    pub(crate) fn deliver(&self, event: TransportEvent) -> usize {
        self.bus.publish(event)
    }
}
