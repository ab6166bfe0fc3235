//! Session/role gate.
//!
//! Decides, from the current [`Session`] and the requested scope, which view
//! mounts: a loading indicator, an access-denied view, or the protected
//! content. The gate never errors; missing identity data fails closed.
//!
//! For tenant portals the rules apply in this order:
//!
//! 1. Session still loading → `Loading`
//! 2. Tenant user on another tenant's slug → `DeniedTenantMismatch`
//!    (regardless of the admin flag)
//! 3. Neither admin nor tenant user, or a tenant user without a slug →
//!    `DeniedRole`
//! 4. Otherwise → `Allowed`

use std::sync::Arc;

use axon_schema::{Role, Session};

use crate::session_source::SessionSource;

// ───────────────────────────── Types ─────────────────────────────

/// What a protected view requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateScope {
    /// Agency admin console.
    AdminConsole,
    /// Tenant portal for the slug taken from the URL.
    Tenant(String),
    /// Client-facing area: admins and clients.
    ClientArea,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Loading,
    DeniedRole,
    DeniedTenantMismatch,
    Allowed { display_name: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            AccessDecision::DeniedRole | AccessDecision::DeniedTenantMismatch
        )
    }

    /// Text for the view that replaces the protected content.
    pub fn message(&self) -> &str {
        match self {
            AccessDecision::Loading => "Loading…",
            AccessDecision::DeniedRole => "Access denied: you do not have permission to view this page.",
            AccessDecision::DeniedTenantMismatch => {
                "Access denied: this portal belongs to a different organization."
            }
            AccessDecision::Allowed { display_name } => display_name,
        }
    }
}

// ───────────────────────────── Decisions ─────────────────────────

/// Tenant portal decision for `requested_slug`.
pub fn decide_tenant(session: &Session, requested_slug: &str) -> AccessDecision {
    decide(session, &GateScope::Tenant(requested_slug.to_string()))
}

fn tenant_rule(session: &Session, requested_slug: &str) -> AccessDecision {
    if session.is_tenant_user {
        let Some(own_slug) = session.tenant_slug() else {
            tracing::warn!(user = ?session.user_id(), "tenant user without tenant slug");
            return AccessDecision::DeniedRole;
        };
        if own_slug != requested_slug {
            tracing::warn!(
                user = ?session.user_id(),
                tenant = own_slug,
                requested = requested_slug,
                "cross-tenant access blocked"
            );
            return AccessDecision::DeniedTenantMismatch;
        }
        let display_name = session
            .tenant_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(own_slug)
            .to_string();
        return AccessDecision::Allowed { display_name };
    }

    if session.is_admin {
        return AccessDecision::Allowed {
            display_name: requested_slug.to_string(),
        };
    }

    AccessDecision::DeniedRole
}

pub fn decide(session: &Session, scope: &GateScope) -> AccessDecision {
    if session.is_loading {
        return AccessDecision::Loading;
    }

    match scope {
        GateScope::Tenant(slug) => tenant_rule(session, slug),
        GateScope::AdminConsole => match session.role() {
            Role::Admin => AccessDecision::Allowed {
                display_name: user_label(session, "Admin"),
            },
            _ => AccessDecision::DeniedRole,
        },
        GateScope::ClientArea => match session.role() {
            Role::Admin | Role::Client => AccessDecision::Allowed {
                display_name: user_label(session, "Client"),
            },
            _ => AccessDecision::DeniedRole,
        },
    }
}

fn user_label(session: &Session, fallback: &str) -> String {
    session
        .user
        .as_ref()
        .and_then(|u| u.display_name.clone().or_else(|| u.email.clone()))
        .or_else(|| session.user_id().map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

// ───────────────────────────── SessionGate ───────────────────────

/// Gate bound to a session source; re-evaluates on every call.
pub struct SessionGate {
    source: Arc<dyn SessionSource>,
}

impl SessionGate {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        Self { source }
    }

    pub fn evaluate(&self, scope: &GateScope) -> AccessDecision {
        decide(&self.source.current(), scope)
    }

    /// Decision for a URL path, reading the slug with `portal_prefix`.
    /// Paths without a slug are treated as the admin console.
    pub fn evaluate_path(&self, path: &str, portal_prefix: &str) -> AccessDecision {
        let scope = match crate::routes::extract_tenant_slug(path, portal_prefix) {
            Some(slug) => GateScope::Tenant(slug.to_string()),
            None => GateScope::AdminConsole,
        };
        self.evaluate(&scope)
    }
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_source::{StaticSession, WatchSession};
    use axon_schema::UserIdentity;

    fn all_sessions() -> Vec<Session> {
        let mut out = Vec::new();
        for bits in 0..16u8 {
            let mut s = Session {
                user: Some(UserIdentity::new("u")),
                is_admin: bits & 1 != 0,
                is_tenant_user: bits & 2 != 0,
                is_client: bits & 4 != 0,
                tenant_slug: if bits & 8 != 0 {
                    Some("acme".into())
                } else {
                    None
                },
                ..Session::default()
            };
            out.push(s.clone());
            s.tenant_slug = Some("other-corp".into());
            out.push(s);
        }
        out
    }

    #[test]
    fn loading_session_never_denied() {
        let session = Session::loading();
        assert_eq!(decide_tenant(&session, "acme"), AccessDecision::Loading);
        assert_eq!(
            decide(&session, &GateScope::AdminConsole),
            AccessDecision::Loading
        );
    }

    #[test]
    fn loading_wins_over_role_flags_in_every_scope() {
        let session = Session {
            is_loading: true,
            ..Session::tenant_user("u1", "acme")
        };
        let scopes = [
            GateScope::AdminConsole,
            GateScope::ClientArea,
            GateScope::Tenant("acme".into()),
            GateScope::Tenant("other-corp".into()),
        ];
        for scope in &scopes {
            assert_eq!(decide(&session, scope), AccessDecision::Loading, "{scope:?}");
        }
        assert_eq!(decide_tenant(&session, "other-corp"), AccessDecision::Loading);
    }

    #[test]
    fn neither_admin_nor_tenant_user_is_denied_role() {
        for session in all_sessions() {
            if session.is_admin || session.is_tenant_user {
                continue;
            }
            assert_eq!(
                decide_tenant(&session, "acme"),
                AccessDecision::DeniedRole,
                "{session:?}"
            );
        }
    }

    #[test]
    fn tenant_user_on_other_slug_is_mismatch_regardless_of_admin() {
        for session in all_sessions() {
            if !session.is_tenant_user || session.tenant_slug() != Some("other-corp") {
                continue;
            }
            assert_eq!(
                decide_tenant(&session, "acme"),
                AccessDecision::DeniedTenantMismatch,
                "{session:?}"
            );
        }
    }

    #[test]
    fn acme_user_requesting_other_corp() {
        let session = Session::tenant_user("u1", "acme");
        assert_eq!(
            decide_tenant(&session, "other-corp"),
            AccessDecision::DeniedTenantMismatch
        );
    }

    #[test]
    fn tenant_user_without_slug_fails_closed() {
        let mut session = Session::tenant_user("u1", "acme");
        session.tenant_slug = None;
        assert_eq!(decide_tenant(&session, "acme"), AccessDecision::DeniedRole);

        session.tenant_slug = Some(String::new());
        assert_eq!(decide_tenant(&session, ""), AccessDecision::DeniedRole);
    }

    #[test]
    fn allowed_display_name_prefers_tenant_name() {
        let session = Session::tenant_user("u1", "acme").with_tenant_name("Acme Corp");
        assert_eq!(
            decide_tenant(&session, "acme"),
            AccessDecision::Allowed {
                display_name: "Acme Corp".into()
            }
        );

        let session = Session::tenant_user("u1", "acme");
        assert_eq!(
            decide_tenant(&session, "acme"),
            AccessDecision::Allowed {
                display_name: "acme".into()
            }
        );
    }

    #[test]
    fn admin_may_open_any_tenant_portal() {
        let session = Session::admin("root");
        assert_eq!(
            decide_tenant(&session, "other-corp"),
            AccessDecision::Allowed {
                display_name: "other-corp".into()
            }
        );
    }

    #[test]
    fn admin_console_requires_admin_role() {
        assert!(decide(&Session::admin("root"), &GateScope::AdminConsole).is_allowed());
        assert_eq!(
            decide(&Session::client("c"), &GateScope::AdminConsole),
            AccessDecision::DeniedRole
        );

        let mut tenant_admin = Session::tenant_user("u", "acme");
        tenant_admin.is_admin = true;
        assert_eq!(
            decide(&tenant_admin, &GateScope::AdminConsole),
            AccessDecision::DeniedRole
        );
    }

    #[test]
    fn client_area_allows_admins_and_clients() {
        assert!(decide(&Session::client("c"), &GateScope::ClientArea).is_allowed());
        assert!(decide(&Session::admin("a"), &GateScope::ClientArea).is_allowed());
        assert!(decide(&Session::tenant_user("t", "acme"), &GateScope::ClientArea).is_denied());
        assert!(decide(&Session::default(), &GateScope::ClientArea).is_denied());
    }

    #[test]
    fn session_gate_follows_source_changes() {
        let source = Arc::new(WatchSession::new(Session::loading()));
        let gate = SessionGate::new(source.clone());

        assert_eq!(
            gate.evaluate_path("/portal/acme", "/portal"),
            AccessDecision::Loading
        );

        source.set(Session::tenant_user("u1", "acme"));
        assert!(gate.evaluate_path("/portal/acme/chat", "/portal").is_allowed());
        assert_eq!(
            gate.evaluate_path("/portal/other-corp", "/portal"),
            AccessDecision::DeniedTenantMismatch
        );
        assert_eq!(
            gate.evaluate_path("/settings", "/portal"),
            AccessDecision::DeniedRole
        );
    }

    #[test]
    fn static_source_gate() {
        let gate = SessionGate::new(Arc::new(StaticSession::new(Session::admin("root"))));
        assert!(gate.evaluate(&GateScope::AdminConsole).is_allowed());
    }
}
