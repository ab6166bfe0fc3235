use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

use axon_client::BackendClient;
use axon_core::{build_speech_controller, load_config, AxonConfig, NotificationCenter};
use commands::backend::{run_catalog, run_health, run_infer, run_trigger};
use commands::chat::run_chat;
use commands::gate::run_gate;

#[derive(Parser)]
#[command(name = "axon", version, about = "Axon portal client: access gate, realtime chat, backend API")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.axon",
        help = "Config root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat over the realtime transport")]
    Chat {
        #[arg(long, help = "Speak assistant replies aloud")]
        speak: bool,
    },
    #[command(about = "Evaluate the access gate for a session and route")]
    Gate {
        #[arg(long, help = "Session snapshot as a JSON file")]
        session: PathBuf,
        #[arg(long, default_value = "/", help = "Route being opened")]
        path: String,
    },
    #[command(about = "Check backend health")]
    Health,
    #[command(about = "Print the backend catalog")]
    Catalog,
    #[command(about = "Trigger a workflow run")]
    Trigger {
        #[arg(long, help = "Workflow ID")]
        workflow: String,
        #[arg(long, default_value = "{}", help = "JSON payload")]
        payload: String,
    },
    #[command(about = "Run an LLM inference through the backend")]
    Infer {
        #[arg(long, help = "Provider name")]
        provider: String,
        #[arg(help = "Prompt text")]
        input: String,
    },
    #[command(about = "Speak text, or play an audio URL")]
    Speak {
        text: String,
        #[arg(long, help = "Audio asset to play instead of synthesizing")]
        audio_url: Option<String>,
    },
    #[command(about = "Validate config files")]
    Validate,
}

fn load(config_root: &std::path::Path) -> Result<AxonConfig> {
    let mut config = load_config(&config_root.join("config"))?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "axon.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load(&cli.config_root)?;
    tracing::debug!(config_root = %cli.config_root.display(), "config loaded");
    let notices = NotificationCenter::default();
    let backend = || {
        BackendClient::with_timeout(
            config.backend.base_url.clone(),
            std::time::Duration::from_secs(config.backend.timeout_secs),
        )
        .context("failed to build HTTP client")
    };

    match command {
        Commands::Validate => {
            println!(
                "Config valid. backend={}, transport={}, speech={} ({}).",
                config.backend.base_url,
                config.transport.ws_url,
                if config.speech.enabled { "on" } else { "off" },
                config.speech.lang,
            );
        }
        Commands::Chat { speak } => {
            run_chat(&config, speak, notices).await?;
        }
        Commands::Gate { session, path } => {
            run_gate(&config, &session, &path)?;
        }
        Commands::Health => run_health(&backend()?, &notices).await?,
        Commands::Catalog => run_catalog(&backend()?, &notices).await?,
        Commands::Trigger { workflow, payload } => {
            run_trigger(&backend()?, &notices, &workflow, &payload).await?
        }
        Commands::Infer { provider, input } => {
            run_infer(&backend()?, &notices, &provider, &input).await?
        }
        Commands::Speak { text, audio_url } => {
            let speech = build_speech_controller(&config.speech);
            if !speech.is_supported() && audio_url.is_none() {
                eprintln!("Speech synthesis is not available ({}).", config.speech.synth_command);
                return Ok(());
            }
            let mut speaking = speech.watch_speaking();
            speech.speak(&text, audio_url.as_deref()).await;
            // Wait for playback to start, then to finish.
            if tokio::time::timeout(
                std::time::Duration::from_secs(5),
                speaking.wait_for(|s| *s),
            )
            .await
            .is_ok()
            {
                let _ = speaking.wait_for(|s| !*s).await;
            }
        }
    }

    Ok(())
}
