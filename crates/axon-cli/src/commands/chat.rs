use std::sync::Arc;

use anyhow::Result;
use axon_core::{build_speech_controller, AxonConfig, ChatChannel, NotificationCenter, SpeechController};
use axon_schema::{ChatMessage, ConnectionState, MessageRole};
use axon_transport::{ChatTransport, WsTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "Commands: /status, /clear, /quit. Anything else is sent as a message.";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Send(String),
    Status,
    Clear,
    Quit,
    Help,
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/clear" => Input::Clear,
        "/status" => Input::Status,
        "/help" => Input::Help,
        text => Input::Send(text.to_string()),
    }
}

/// Assistant messages after the one with id `last_seen`, and the id of the
/// newest message. When `last_seen` is gone from the log (cleared), every
/// message is new.
fn unseen_replies(
    messages: &[ChatMessage],
    last_seen: Option<&str>,
) -> (Vec<ChatMessage>, Option<String>) {
    let start = last_seen
        .and_then(|id| messages.iter().position(|m| m.id == id))
        .map_or(0, |pos| pos + 1);
    let replies = messages[start..]
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .cloned()
        .collect();
    let newest = messages
        .last()
        .map(|m| m.id.clone())
        .or_else(|| last_seen.map(str::to_string));
    (replies, newest)
}

pub async fn run_chat(config: &AxonConfig, speak: bool, notices: NotificationCenter) -> Result<()> {
    let transport = Arc::new(WsTransport::with_config(
        &config.transport.ws_url,
        config.transport.ws_config(),
    )?);
    let channel = Arc::new(ChatChannel::attach(transport.clone(), Some(notices.clone())));
    let supervisor = transport.clone().spawn_supervisor();
    tracing::info!(url = %transport.url(), speak, "chat session started");

    let speech = if speak {
        let controller = build_speech_controller(&config.speech);
        if !controller.is_supported() {
            notices.warn("speech synthesis is not available, replies will not be spoken");
        }
        Some(controller)
    } else {
        None
    };

    let printer = tokio::spawn(print_updates(channel.clone(), speech));
    let mut notice_rx = notices.subscribe();
    let notice_printer = tokio::spawn(async move {
        loop {
            match notice_rx.recv().await {
                Ok(notice) => eprintln!("[{:?}] {}", notice.level, notice.text),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("Chat on {} ({HELP})", transport.url());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Status => println!(
                "Connection: {}, {} message(s)",
                channel.connection_state().await,
                channel.len().await
            ),
            Input::Clear => {
                channel.clear_messages().await;
                println!("Conversation cleared.");
            }
            Input::Send(text) => {
                let sent = channel.send_message(text).await;
                if !sent.emitted {
                    eprintln!("(not connected, message kept locally only)");
                }
            }
        }
    }

    supervisor.abort();
    transport.disconnect().await;
    printer.abort();
    notice_printer.abort();
    let _ = printer.await;
    if let Ok(channel) = Arc::try_unwrap(channel) {
        channel.detach().await;
    }
    tracing::info!("chat session ended");
    Ok(())
}

async fn print_updates(channel: Arc<ChatChannel>, speech: Option<SpeechController>) {
    let mut updates = channel.subscribe_updates();
    let mut last_seen: Option<String> = None;
    let mut last_state = ConnectionState::Disconnected;
    while updates.changed().await.is_ok() {
        let state = channel.connection_state().await;
        if state != last_state {
            eprintln!("-- {state}");
            last_state = state;
        }

        let (replies, newest) = unseen_replies(&channel.messages().await, last_seen.as_deref());
        last_seen = newest;
        for reply in replies {
            println!("bot> {}", reply.content);
            if let Some(speech) = &speech {
                speech.speak(&reply.content, reply.audio_url.as_deref()).await;
            }
        }
    }
}
