//! Audio playback and speech synthesis side channel.
//!
//! Independent of the chat log. `speak` prefers a supplied audio URL and
//! falls back to on-device synthesis; the speaking indicator follows the
//! lifecycle events reported by whichever back-end is active.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub const DEFAULT_SPEECH_LANG: &str = "es-ES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Ended,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_available(&self) -> bool;
    async fn speak(&self, utterance: Utterance) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>>;
    async fn cancel(&self);
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, url: &str) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>>;
    async fn stop(&self);
}

pub struct SpeechController {
    synth: Option<Arc<dyn SpeechSynthesizer>>,
    player: Option<Arc<dyn AudioPlayer>>,
    lang: String,
    supported: bool,
    speaking: Arc<watch::Sender<bool>>,
    generation: Arc<AtomicU64>,
    tracker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechController {
    /// Synthesis support is probed once, here.
    pub fn new(
        synth: Option<Arc<dyn SpeechSynthesizer>>,
        player: Option<Arc<dyn AudioPlayer>>,
        lang: impl Into<String>,
    ) -> Self {
        let supported = synth.as_ref().is_some_and(|s| s.is_available());
        let (speaking, _) = watch::channel(false);
        Self {
            synth,
            player,
            lang: lang.into(),
            supported,
            speaking: Arc::new(speaking),
            generation: Arc::new(AtomicU64::new(0)),
            tracker: Mutex::new(None),
        }
    }

    /// Controller with neither synthesis nor playback.
    pub fn disabled() -> Self {
        Self::new(None, None, DEFAULT_SPEECH_LANG)
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking.borrow()
    }

    pub fn watch_speaking(&self) -> watch::Receiver<bool> {
        self.speaking.subscribe()
    }

    pub async fn speak(&self, text: &str, audio_url: Option<&str>) {
        if let (Some(url), Some(player)) = (audio_url, self.player.as_ref()) {
            self.interrupt().await;
            match player.play(url).await {
                Ok(events) => self.track(events),
                Err(e) => {
                    tracing::warn!(url, error = %e, "audio playback failed to start");
                    self.speaking.send_replace(false);
                }
            }
            return;
        }

        let Some(synth) = self.synth.as_ref().filter(|_| self.supported) else {
            tracing::warn!("speech synthesis not supported, skipping");
            return;
        };

        self.interrupt().await;
        let utterance = Utterance {
            text: text.to_string(),
            lang: self.lang.clone(),
        };
        match synth.speak(utterance).await {
            Ok(events) => self.track(events),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed to start");
                self.speaking.send_replace(false);
            }
        }
    }

    /// Cancel synthesis and playback and clear the speaking indicator.
    pub async fn stop(&self) {
        self.interrupt().await;
        self.speaking.send_replace(false);
    }

    async fn interrupt(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(tracker) = self.tracker_slot().take() {
            tracker.abort();
        }
        if let Some(synth) = self.synth.as_ref().filter(|_| self.supported) {
            synth.cancel().await;
        }
        if let Some(player) = self.player.as_ref() {
            player.stop().await;
        }
    }

    fn track(&self, mut events: mpsc::UnboundedReceiver<PlaybackEvent>) {
        let generation = self.generation.load(Ordering::SeqCst);
        let current = self.generation.clone();
        let speaking = self.speaking.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                match event {
                    PlaybackEvent::Started => {
                        speaking.send_replace(true);
                    }
                    PlaybackEvent::Ended => {
                        speaking.send_replace(false);
                        return;
                    }
                    PlaybackEvent::Failed(reason) => {
                        tracing::warn!(%reason, "playback failed");
                        speaking.send_replace(false);
                        return;
                    }
                }
            }
            if current.load(Ordering::SeqCst) == generation {
                speaking.send_replace(false);
            }
        });
        *self.tracker_slot() = Some(handle);
    }

    fn tracker_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SpeechController {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker_slot().take() {
            tracker.abort();
        }
    }
}
