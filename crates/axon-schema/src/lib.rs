pub mod api;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use api::*;

/// Outbound user message event name.
pub const EVENT_CHAT_USER: &str = "chat:user";
/// Inbound assistant message event name.
pub const EVENT_CHAT_ASSISTANT: &str = "chat:assistant";

// ───────────────────────────── Session ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Effective role derived from the auth flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    TenantUser,
    Client,
    None,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::TenantUser => write!(f, "tenant_user"),
            Role::Client => write!(f, "client"),
            Role::None => write!(f, "none"),
        }
    }
}

/// Snapshot of what the auth provider exposes. Read-only to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<UserIdentity>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_tenant_user: bool,
    #[serde(default)]
    pub is_client: bool,
    #[serde(default)]
    pub tenant_slug: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub is_loading: bool,
}

impl Session {
    /// A session whose auth bootstrap has not finished.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity::new(user_id)),
            is_admin: true,
            ..Self::default()
        }
    }

    pub fn tenant_user(user_id: impl Into<String>, tenant_slug: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity::new(user_id)),
            is_tenant_user: true,
            tenant_slug: Some(tenant_slug.into()),
            ..Self::default()
        }
    }

    pub fn client(user_id: impl Into<String>) -> Self {
        Self {
            user: Some(UserIdentity::new(user_id)),
            is_client: true,
            ..Self::default()
        }
    }

    pub fn with_tenant_name(mut self, name: impl Into<String>) -> Self {
        self.tenant_name = Some(name.into());
        self
    }

    /// Tenant scope wins over the admin flag: a tenant-scoped user is always
    /// treated as a tenant user.
    pub fn role(&self) -> Role {
        if self.is_tenant_user {
            Role::TenantUser
        } else if self.is_admin {
            Role::Admin
        } else if self.is_client {
            Role::Client
        } else {
            Role::None
        }
    }

    /// Non-empty tenant slug, if any.
    pub fn tenant_slug(&self) -> Option<&str> {
        self.tenant_slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
        }
    }
}

// ───────────────────────────── Chat ─────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

impl ChatMessage {
    fn build(role: MessageRole, content: String, audio_url: Option<String>) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{timestamp}-{seq}"),
            role,
            content,
            timestamp,
            audio_url,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::build(MessageRole::User, text.into(), None)
    }

    pub fn assistant(text: impl Into<String>, audio_url: Option<String>) -> Self {
        Self::build(MessageRole::Assistant, text.into(), audio_url)
    }
}

// ───────────────────────────── Wire ─────────────────────────────

/// Payload of an outbound `chat:user` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub text: String,
}

/// Payload of an inbound `chat:assistant` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// One JSON text frame on the socket: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WireFrame {
    pub fn chat_user(text: impl Into<String>) -> Self {
        Self {
            event: EVENT_CHAT_USER.to_string(),
            data: serde_json::json!({ "text": text.into() }),
        }
    }
}

/// Events a transport delivers to its listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Failed { reason: String },
    Assistant(AssistantPayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prefers_tenant_scope_over_admin() {
        let mut session = Session::tenant_user("u1", "acme");
        session.is_admin = true;
        assert_eq!(session.role(), Role::TenantUser);
        assert_eq!(Session::admin("a").role(), Role::Admin);
        assert_eq!(Session::client("c").role(), Role::Client);
        assert_eq!(Session::default().role(), Role::None);
    }

    #[test]
    fn blank_tenant_slug_is_treated_as_missing() {
        let session = Session::tenant_user("u1", "  ");
        assert_eq!(session.tenant_slug(), None);
    }

    #[test]
    fn message_ids_are_unique() {
        let a = ChatMessage::user("one");
        let b = ChatMessage::user("one");
        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn assistant_payload_without_audio() {
        let payload: AssistantPayload = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(payload.text, "hi");
        assert!(payload.audio_url.is_none());
    }

    #[test]
    fn chat_user_frame_shape() {
        let frame = WireFrame::chat_user("hello");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "chat:user");
        assert_eq!(json["data"]["text"], "hello");
    }

    #[test]
    fn session_deserializes_with_missing_fields() {
        let session: Session =
            serde_json::from_str(r#"{"is_tenant_user": true, "tenant_slug": "acme"}"#).unwrap();
        assert_eq!(session.role(), Role::TenantUser);
        assert!(!session.is_loading);
        assert!(session.user.is_none());
    }
}
