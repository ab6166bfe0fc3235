//! Redirect of tenant users from tenant-agnostic entry routes to their
//! tenant's portal.

use axon_schema::{Role, Session};
use tokio::sync::{mpsc, watch};

use crate::routes::{canonical_tenant_route, is_entry_route};

pub struct TenantRedirect {
    portal_prefix: String,
    entry_routes: Vec<String>,
    last_resolved: Option<Session>,
}

impl TenantRedirect {
    pub fn new(portal_prefix: impl Into<String>, entry_routes: Vec<String>) -> Self {
        Self {
            portal_prefix: portal_prefix.into(),
            entry_routes,
            last_resolved: None,
        }
    }

    /// Navigation target for this observation, if any.
    ///
    /// Fires at most once per distinct resolved session: observing the same
    /// session again returns `None`. Loading sessions are ignored entirely.
    pub fn observe(&mut self, session: &Session, current_route: &str) -> Option<String> {
        if session.is_loading {
            return None;
        }
        if self.last_resolved.as_ref() == Some(session) {
            return None;
        }
        self.last_resolved = Some(session.clone());

        if session.role() != Role::TenantUser {
            return None;
        }
        let slug = session.tenant_slug()?;
        if !is_entry_route(current_route, &self.entry_routes) {
            return None;
        }

        let target = canonical_tenant_route(&self.portal_prefix, slug);
        tracing::info!(tenant = slug, from = current_route, to = %target, "tenant redirect");
        Some(target)
    }

    /// Follow session updates for a view mounted at `current_route`, sending
    /// navigation targets to `nav`. Ends when the session source or the
    /// navigator goes away.
    pub async fn follow(
        mut self,
        mut sessions: watch::Receiver<Session>,
        current_route: String,
        nav: mpsc::UnboundedSender<String>,
    ) {
        loop {
            let session = sessions.borrow_and_update().clone();
            if let Some(target) = self.observe(&session, &current_route) {
                if nav.send(target).is_err() {
                    return;
                }
            }
            if sessions.changed().await.is_err() {
                return;
            }
        }
    }
}
