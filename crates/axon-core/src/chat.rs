//! Realtime chat channel.
//!
//! Attaches to a shared [`ChatTransport`], keeps the append-only message log
//! and mirrors the connection state from transport events. Outbound messages
//! are appended optimistically before emission; there is no acknowledgment.

use std::sync::Arc;

use axon_bus::Topic;
use axon_schema::{ChatMessage, ConnectionState, TransportEvent, WireFrame};
use axon_transport::ChatTransport;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::notify::NotificationCenter;

struct ChatState {
    messages: Vec<ChatMessage>,
    connection: ConnectionState,
}

/// Result of [`ChatChannel::send_message`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: ChatMessage,
    /// Whether the transport accepted the frame. `false` while disconnected;
    /// the message stays in the log either way.
    pub emitted: bool,
}

pub struct ChatChannel {
    transport: Arc<dyn ChatTransport>,
    state: Arc<RwLock<ChatState>>,
    revision: Arc<watch::Sender<u64>>,
    listener: Option<JoinHandle<()>>,
}

impl ChatChannel {
    /// Register listeners on `transport` and start mirroring its events.
    pub fn attach(transport: Arc<dyn ChatTransport>, notices: Option<NotificationCenter>) -> Self {
        let mut subscription = transport.subscribe(&Topic::ALL);
        let state = Arc::new(RwLock::new(ChatState {
            messages: Vec::new(),
            connection: transport.state(),
        }));
        let (revision, _) = watch::channel(0u64);
        let revision = Arc::new(revision);

        let task_state = state.clone();
        let task_revision = revision.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                apply_event(&task_state, event, notices.as_ref()).await;
                task_revision.send_modify(|r| *r += 1);
            }
        });

        Self {
            transport,
            state,
            revision,
            listener: Some(listener),
        }
    }

    /// Append a user message and emit it as `chat:user`.
    pub async fn send_message(&self, text: impl Into<String>) -> SentMessage {
        let message = ChatMessage::user(text);
        self.state.write().await.messages.push(message.clone());
        self.bump();

        let emitted = self.transport.emit(WireFrame::chat_user(message.content.clone()));
        if !emitted {
            tracing::debug!(id = %message.id, "message kept locally, transport not connected");
        }
        SentMessage { message, emitted }
    }

    /// Remove every message. The connection is not touched.
    pub async fn clear_messages(&self) {
        self.state.write().await.messages.clear();
        self.bump();
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Ticks on every change to the log or the connection state.
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Remove the transport listeners. Waits until they are gone, so no
    /// event is applied after this returns.
    pub async fn detach(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn apply_event(
    state: &RwLock<ChatState>,
    event: TransportEvent,
    notices: Option<&NotificationCenter>,
) {
    let mut state = state.write().await;
    match event {
        TransportEvent::Connected => state.connection = ConnectionState::Connected,
        TransportEvent::Disconnected => state.connection = ConnectionState::Disconnected,
        TransportEvent::Failed { reason } => {
            state.connection = ConnectionState::Error;
            if let Some(notices) = notices {
                notices.error(format!("Chat connection error: {reason}"));
            }
        }
        TransportEvent::Assistant(payload) => {
            state
                .messages
                .push(ChatMessage::assistant(payload.text, payload.audio_url));
        }
    }
}
