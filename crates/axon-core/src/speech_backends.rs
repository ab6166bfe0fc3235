//! Speech back-ends that drive external programs: `espeak-ng` for on-device
//! synthesis and a command-line media player for audio URLs.

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::speech::{AudioPlayer, PlaybackEvent, SpeechSynthesizer, Utterance};

/// Whether `program` can be executed: an existing path, or a name found on
/// `PATH`.
pub fn program_available(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// espeak voice name for a BCP-47 tag: `es-ES` → `es`.
pub fn espeak_voice(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or(lang)
        .to_ascii_lowercase()
}

/// Only `http`, `https` and `file` URLs are handed to the player.
pub fn playable_url(raw: &str) -> Result<url::Url> {
    let url = url::Url::parse(raw).with_context(|| format!("invalid audio url: {raw}"))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(anyhow!("unsupported audio url scheme: {other}")),
    }
}

/// Cancel handle of the running child, if any.
type Running = Mutex<Option<oneshot::Sender<()>>>;

fn take_running(running: &Running) -> Option<oneshot::Sender<()>> {
    running
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Spawn `cmd` and report its lifecycle. Sending on the returned cancel
/// handle kills the child and reports `Ended`.
fn spawn_tracked(
    mut cmd: Command,
    label: &str,
) -> Result<(mpsc::UnboundedReceiver<PlaybackEvent>, oneshot::Sender<()>)> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let mut child = cmd.spawn().with_context(|| format!("failed to start {label}"))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let label = label.to_string();

    let _ = tx.send(PlaybackEvent::Started);
    tokio::spawn(async move {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel_rx => None,
        };
        let event = match exited {
            Some(Ok(status)) if status.success() => PlaybackEvent::Ended,
            Some(Ok(status)) => PlaybackEvent::Failed(format!("{label} exited with {status}")),
            Some(Err(e)) => PlaybackEvent::Failed(format!("{label}: {e}")),
            None => {
                let _ = child.kill().await;
                PlaybackEvent::Ended
            }
        };
        let _ = tx.send(event);
    });

    Ok((rx, cancel_tx))
}

pub struct CommandSynthesizer {
    program: String,
    available: bool,
    running: Running,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let available = program_available(&program);
        if !available {
            tracing::debug!(%program, "speech synthesizer not found");
        }
        Self {
            program,
            available,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, utterance: Utterance) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>> {
        let mut cmd = Command::new(&self.program);
        // Text comes from the server; `--` keeps a leading `-` from being read as an option.
        cmd.arg("-v")
            .arg(espeak_voice(&utterance.lang))
            .arg("--")
            .arg(&utterance.text);
        let (rx, cancel) = spawn_tracked(cmd, &self.program)?;
        if let Some(previous) = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(cancel)
        {
            let _ = previous.send(());
        }
        Ok(rx)
    }

    async fn cancel(&self) {
        if let Some(cancel) = take_running(&self.running) {
            let _ = cancel.send(());
        }
    }
}

pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    running: Running,
}

impl CommandPlayer {
    /// `args` go before the URL.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            running: Mutex::new(None),
        }
    }

    /// `ffplay` without a window, exiting when the stream ends.
    pub fn ffplay() -> Self {
        Self::new(
            "ffplay",
            ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn is_available(&self) -> bool {
        program_available(&self.program)
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, url: &str) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>> {
        let url = playable_url(url)?;
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(url.as_str());
        let (rx, cancel) = spawn_tracked(cmd, &self.program)?;
        if let Some(previous) = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(cancel)
        {
            let _ = previous.send(());
        }
        Ok(rx)
    }

    async fn stop(&self) {
        if let Some(cancel) = take_running(&self.running) {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_from_language_tag() {
        assert_eq!(espeak_voice("es-ES"), "es");
        assert_eq!(espeak_voice("pt_BR"), "pt");
        assert_eq!(espeak_voice("en"), "en");
    }

    #[test]
    fn missing_program_is_unavailable() {
        assert!(!program_available("definitely-not-a-real-tts-binary"));
        assert!(!CommandSynthesizer::new("/nonexistent/espeak-ng").is_available());
    }

    #[test]
    fn only_media_urls_are_playable() {
        assert!(playable_url("https://cdn.example.com/a.mp3").is_ok());
        assert!(playable_url("file:///tmp/a.wav").is_ok());
        assert!(playable_url("-i/etc/passwd").is_err());
        assert!(playable_url("javascript:alert(1)").is_err());
    }

    /// Writes a shell script that records its argv, one per line.
    #[cfg(unix)]
    fn argv_recorder(dir: &Path) -> (String, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("record-args");
        let log = dir.join("args.log");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script.display().to_string(), log)
    }

    #[cfg(unix)]
    async fn wait_finished(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) {
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        let end = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(end, Some(PlaybackEvent::Ended));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dash_leading_text_is_not_parsed_as_options() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (program, log) = argv_recorder(tmp.path());

        let synth = CommandSynthesizer::new(program);
        assert!(synth.is_available());
        let mut rx = synth
            .speak(Utterance {
                text: "-w/tmp/out.wav".into(),
                lang: "es-ES".into(),
            })
            .await
            .unwrap();
        wait_finished(&mut rx).await;

        let argv = std::fs::read_to_string(log).unwrap();
        let argv: Vec<&str> = argv.lines().collect();
        assert_eq!(argv, ["-v", "es", "--", "-w/tmp/out.wav"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn player_rejects_option_like_urls() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (program, log) = argv_recorder(tmp.path());
        let player = CommandPlayer::new(program, vec!["-nodisp".into()]);

        assert!(player.play("-f/tmp/out").await.is_err());
        assert!(!log.exists());

        let mut rx = player.play("https://cdn.example.com/a.mp3").await.unwrap();
        wait_finished(&mut rx).await;
        let argv = std::fs::read_to_string(log).unwrap();
        let argv: Vec<&str> = argv.lines().collect();
        assert_eq!(argv, ["-nodisp", "https://cdn.example.com/a.mp3"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tracked_command_reports_lifecycle() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 0");
        let (mut rx, _cancel) = spawn_tracked(cmd, "sh").unwrap();
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Ended));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelling_a_tracked_command_ends_it() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30");
        let (mut rx, cancel) = spawn_tracked(cmd, "sh").unwrap();
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        cancel.send(()).unwrap();
        let ended = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(ended, Some(PlaybackEvent::Ended));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_failure() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let (mut rx, _cancel) = spawn_tracked(cmd, "sh").unwrap();
        assert_eq!(rx.recv().await, Some(PlaybackEvent::Started));
        assert!(matches!(rx.recv().await, Some(PlaybackEvent::Failed(_))));
    }
}
