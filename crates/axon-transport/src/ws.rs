//! WebSocket transport over tokio-tungstenite.
//!
//! Frames are JSON text messages of the form `{"event": ..., "data": ...}`.
//! One IO task per live connection owns both halves of the socket; outbound
//! frames reach it through an unbounded channel so [`ChatTransport::emit`]
//! stays synchronous.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axon_bus::{Subscription, Topic};
use axon_schema::{
    AssistantPayload, ConnectionState, TransportEvent, WireFrame, EVENT_CHAT_ASSISTANT,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::reconnect_delay_ms;
use crate::error::{Result, TransportError};
use crate::{ChatTransport, ConnectionCell, Signal};

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// 0 = retry forever
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

struct Shared {
    cell: ConnectionCell,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    closing: AtomicBool,
    shutdown: Notify,
}

impl Shared {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
        self.outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum SessionEnd {
    Closed,
    Failed(String),
}

pub struct WsTransport {
    url: Url,
    config: WsConfig,
    shared: Arc<Shared>,
    io_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, WsConfig::default())
    }

    pub fn with_config(url: &str, config: WsConfig) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(TransportError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            config,
            shared: Arc::new(Shared {
                cell: ConnectionCell::new(),
                outbound: Mutex::new(None),
                closing: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
            io_task: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn io_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.io_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make a single connection attempt. Clears a previous
    /// [`WsTransport::disconnect`].
    pub async fn connect(&self) -> Result<()> {
        self.shared.closing.store(false, Ordering::SeqCst);
        self.attempt().await
    }

    async fn attempt(&self) -> Result<()> {
        if !self.shared.cell.apply(Signal::Attempt, None) {
            return match self.shared.cell.current() {
                ConnectionState::Connected => Ok(()),
                _ => Err(TransportError::Connect(
                    "connection attempt already in progress".to_string(),
                )),
            };
        }

        info!(url = %self.url, "connecting");
        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(self.url.as_str()),
        )
        .await;

        let mut ws = match attempt {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                let err = TransportError::Connect(e.to_string());
                self.shared.cell.apply(Signal::Failed, Some(err.to_string()));
                return Err(err);
            }
            Err(_) => {
                let err = TransportError::Timeout(self.config.connect_timeout);
                self.shared.cell.apply(Signal::Failed, Some(err.to_string()));
                return Err(err);
            }
        };

        if self.shared.closing.load(Ordering::SeqCst) {
            debug!(url = %self.url, "disconnected while connecting, dropping socket");
            let _ = ws.close(None).await;
            self.shared.cell.apply(Signal::Closed, None);
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.outbound() = Some(tx);
        if !self.shared.cell.apply(Signal::Opened, None) {
            // A disconnect won the race; nothing may use this socket.
            self.shared.outbound().take();
            debug!(
                url = %self.url,
                state = %self.shared.cell.current(),
                "open rejected, dropping socket"
            );
            let _ = ws.close(None).await;
            return Err(TransportError::Closed);
        }
        info!(url = %self.url, "connected");

        let handle = tokio::spawn(run_io(self.shared.clone(), ws, rx));
        if let Some(previous) = self.io_task().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Close the connection and stop any reconnect loop.
    pub async fn disconnect(&self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.shutdown.notify_waiters();
        // Dropping the sender tells the IO task to send a close frame.
        self.shared.outbound().take();

        let handle = self.io_task().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!(url = %self.url, "IO task did not stop in time, aborting");
                abort.abort();
            }
        }
        self.shared.cell.apply(Signal::Closed, None);
    }

    fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::SeqCst)
    }

    /// Keep the connection alive, reconnecting with backoff after failures
    /// and closes until [`WsTransport::disconnect`] is called.
    pub fn spawn_supervisor(self: Arc<Self>) -> JoinHandle<()> {
        self.shared.closing.store(false, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                match self.attempt().await {
                    Ok(()) => {
                        failures = 0;
                        let mut state_rx = self.shared.cell.watch();
                        let _ = state_rx
                            .wait_for(|s| {
                                matches!(s, ConnectionState::Disconnected | ConnectionState::Error)
                            })
                            .await;
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(url = %self.url, attempt = failures, error = %e, "connect failed");
                    }
                }

                let shutdown = self.shared.shutdown.notified();
                tokio::pin!(shutdown);
                shutdown.as_mut().enable();

                if self.is_closing() {
                    break;
                }
                let reconnect = &self.config.reconnect;
                if !reconnect.enabled {
                    break;
                }
                if reconnect.max_attempts > 0 && failures >= reconnect.max_attempts {
                    warn!(url = %self.url, failures, "giving up reconnecting");
                    break;
                }

                let delay = reconnect_delay_ms(failures);
                debug!(url = %self.url, delay_ms = delay, "reconnecting");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    _ = &mut shutdown => {}
                }
                if self.is_closing() {
                    break;
                }
            }
            debug!(url = %self.url, "supervisor stopped");
        })
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.io_task().take() {
            handle.abort();
        }
    }
}

impl ChatTransport for WsTransport {
    fn state(&self) -> ConnectionState {
        self.shared.cell.current()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.cell.watch()
    }

    fn subscribe(&self, topics: &[Topic]) -> Subscription {
        self.shared.cell.subscribe(topics)
    }

    fn emit(&self, frame: WireFrame) -> bool {
        if self.shared.cell.current() != ConnectionState::Connected {
            debug!(event = %frame.event, "not connected, frame dropped");
            return false;
        }
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(event = %frame.event, error = %e, "failed to encode frame");
                return false;
            }
        };
        match self.shared.outbound().as_ref() {
            Some(tx) => tx.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn run_io(shared: Arc<Shared>, ws: WsStream, mut rx: mpsc::UnboundedReceiver<Message>) {
    let (mut sink, mut stream) = ws.split();

    let end = loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        break SessionEnd::Failed(e.to_string());
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break SessionEnd::Closed;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&shared, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break SessionEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => break SessionEnd::Failed(e.to_string()),
            },
        }
    };

    shared.outbound().take();
    match end {
        SessionEnd::Closed => {
            info!("connection closed");
            shared.cell.apply(Signal::Closed, None);
        }
        SessionEnd::Failed(reason) => {
            warn!(%reason, "connection failed");
            shared.cell.apply(Signal::Failed, Some(reason));
        }
    }
}

fn handle_text(shared: &Shared, text: &str) {
    let frame: WireFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "malformed frame ignored");
            return;
        }
    };

    if frame.event != EVENT_CHAT_ASSISTANT {
        debug!(event = %frame.event, "unhandled event");
        return;
    }

    match serde_json::from_value::<AssistantPayload>(frame.data) {
        Ok(payload) => {
            shared.cell.deliver(TransportEvent::Assistant(payload));
        }
        Err(e) => warn!(error = %e, "malformed chat:assistant payload ignored"),
    }
}
