use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axon_transport::{ReconnectConfig, WsConfig};
use serde::{Deserialize, Serialize};

use crate::speech::DEFAULT_SPEECH_LANG;

pub const CONFIG_FILE: &str = "axon.yaml";

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_lang() -> String {
    DEFAULT_SPEECH_LANG.to_string()
}

fn default_synth_command() -> String {
    "espeak-ng".to_string()
}

fn default_player_command() -> String {
    "ffplay".to_string()
}

fn default_portal_prefix() -> String {
    "/portal".to_string()
}

fn default_entry_routes() -> Vec<String> {
    vec!["/".to_string(), "/portal".to_string(), "/dashboard".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 0 = retry forever
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect: ReconnectSection::default(),
        }
    }
}

impl TransportSection {
    pub fn ws_config(&self) -> WsConfig {
        WsConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            reconnect: ReconnectConfig {
                enabled: self.reconnect.enabled,
                max_attempts: self.reconnect.max_attempts,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_synth_command")]
    pub synth_command: String,
    #[serde(default = "default_player_command")]
    pub player_command: String,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            lang: default_lang(),
            synth_command: default_synth_command(),
            player_command: default_player_command(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutesSection {
    #[serde(default = "default_portal_prefix")]
    pub portal_prefix: String,
    #[serde(default = "default_entry_routes")]
    pub entry_routes: Vec<String>,
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            portal_prefix: default_portal_prefix(),
            entry_routes: default_entry_routes(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxonConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub speech: SpeechSection,
    #[serde(default)]
    pub routes: RoutesSection,
}

impl AxonConfig {
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.backend.base_url)
            .with_context(|| format!("invalid backend.base_url: {}", self.backend.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!(
                "backend.base_url must be http(s), got: {}",
                base.scheme()
            ));
        }

        let ws = url::Url::parse(&self.transport.ws_url)
            .with_context(|| format!("invalid transport.ws_url: {}", self.transport.ws_url))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(anyhow!(
                "transport.ws_url must be ws(s), got: {}",
                ws.scheme()
            ));
        }

        if !self.routes.portal_prefix.starts_with('/') {
            return Err(anyhow!(
                "routes.portal_prefix must start with '/': {}",
                self.routes.portal_prefix
            ));
        }
        Ok(())
    }

    /// `AXON_BACKEND_URL` and `AXON_WS_URL` override the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AXON_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("AXON_WS_URL") {
            if !url.trim().is_empty() {
                self.transport.ws_url = url.trim().to_string();
            }
        }
    }
}

/// Load `<config_dir>/axon.yaml`. A missing file yields the defaults.
pub fn load_config(config_dir: &Path) -> Result<AxonConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AxonConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: AxonConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}
