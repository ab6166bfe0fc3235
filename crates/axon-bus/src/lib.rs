use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use axon_schema::TransportEvent;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    Connect,
    Disconnect,
    Error,
    ChatAssistant,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Connect,
        Topic::Disconnect,
        Topic::Error,
        Topic::ChatAssistant,
    ];

    pub fn from_event(event: &TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => Topic::Connect,
            TransportEvent::Disconnected => Topic::Disconnect,
            TransportEvent::Failed { .. } => Topic::Error,
            TransportEvent::Assistant(_) => Topic::ChatAssistant,
        }
    }
}

struct Subscriber {
    id: u64,
    topics: Vec<Topic>,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

type Registry = Mutex<Vec<Subscriber>>;

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<Subscriber>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fan-out of transport events to listeners.
///
/// A listener registered for several topics receives them on a single
/// channel, so delivery order across topics is preserved.
pub struct EventBus {
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push(Subscriber {
            id,
            topics: topics.to_vec(),
            tx,
        });
        tracing::debug!(subscription = id, ?topics, "listener registered");
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver `event` to every listener of its topic. Returns how many
    /// listeners received it.
    pub fn publish(&self, event: TransportEvent) -> usize {
        let topic = Topic::from_event(&event);
        let mut subs = lock(&self.subscribers);
        subs.retain(|s| !s.tx.is_closed());
        let mut delivered = 0;
        for sub in subs.iter().filter(|s| s.topics.contains(&topic)) {
            if sub.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

/// Listener handle. Dropping it deregisters the listener.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }

    /// Explicit form of dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).retain(|s| s.id != self.id);
            tracing::debug!(subscription = self.id, "listener removed");
        }
    }
}
