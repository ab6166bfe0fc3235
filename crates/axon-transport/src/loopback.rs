//! In-process transport: records outbound frames and lets the caller inject
//! inbound events. Used by tests and the offline demo mode of the CLI.

use std::sync::Mutex;

use axon_bus::{Subscription, Topic};
use axon_schema::{AssistantPayload, ConnectionState, TransportEvent, WireFrame};
use tokio::sync::watch;

use crate::{ChatTransport, ConnectionCell, Signal};

pub struct LoopbackTransport {
    cell: ConnectionCell,
    sent: Mutex<Vec<WireFrame>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            cell: ConnectionCell::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Start in the connected state.
    pub fn connected() -> Self {
        let transport = Self::new();
        transport.open();
        transport
    }

    /// Attempt and open in one step.
    pub fn open(&self) {
        self.cell.apply(Signal::Attempt, None);
        self.cell.apply(Signal::Opened, None);
    }

    pub fn attempt(&self) -> bool {
        self.cell.apply(Signal::Attempt, None)
    }

    pub fn close(&self) -> bool {
        self.cell.apply(Signal::Closed, None)
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.cell.apply(Signal::Failed, Some(reason.into()))
    }

    /// Inject an inbound `chat:assistant` event.
    pub fn deliver_assistant(&self, text: impl Into<String>, audio_url: Option<String>) -> usize {
        self.cell.deliver(TransportEvent::Assistant(AssistantPayload {
            text: text.into(),
            audio_url,
        }))
    }

    pub fn sent_frames(&self) -> Vec<WireFrame> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ChatTransport for LoopbackTransport {
    fn state(&self) -> ConnectionState {
        self.cell.current()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.cell.watch()
    }

    fn subscribe(&self, topics: &[Topic]) -> Subscription {
        self.cell.subscribe(topics)
    }

    fn emit(&self, frame: WireFrame) -> bool {
        if self.cell.current() != ConnectionState::Connected {
            tracing::debug!(event = %frame.event, "loopback not connected, frame dropped");
            return false;
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(frame);
        true
    }
}
