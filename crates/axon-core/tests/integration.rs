use std::sync::Arc;
use std::time::Duration;

use axon_core::*;
use axon_schema::{ConnectionState, MessageRole, Session};
use axon_transport::{ChatTransport, LoopbackTransport};
use tokio::time::timeout;

#[test]
fn cross_tenant_portal_is_blocked_without_redirect() {
    let config = AxonConfig::default();
    let session = Session::tenant_user("u1", "acme");
    let gate = SessionGate::new(Arc::new(StaticSession::new(session.clone())));
    let mut redirect = TenantRedirect::new(
        config.routes.portal_prefix.clone(),
        config.routes.entry_routes.clone(),
    );

    let route = "/portal/other-corp";
    assert_eq!(
        gate.evaluate_path(route, &config.routes.portal_prefix),
        AccessDecision::DeniedTenantMismatch
    );
    assert_eq!(redirect.observe(&session, route), None);
}

#[test]
fn tenant_login_flow_lands_on_own_portal() {
    let config = AxonConfig::default();
    let source = Arc::new(WatchSession::new(Session::loading()));
    let gate = SessionGate::new(source.clone());
    let mut redirect = TenantRedirect::new(
        config.routes.portal_prefix.clone(),
        config.routes.entry_routes.clone(),
    );

    assert_eq!(redirect.observe(&source.current(), "/"), None);
    assert_eq!(
        gate.evaluate_path("/portal/acme", "/portal"),
        AccessDecision::Loading
    );

    source.set(Session::tenant_user("u1", "acme").with_tenant_name("Acme Corp"));
    let target = redirect.observe(&source.current(), "/").unwrap();
    assert_eq!(target, "/portal/acme");
    assert_eq!(
        gate.evaluate_path(&target, "/portal"),
        AccessDecision::Allowed {
            display_name: "Acme Corp".into()
        }
    );

    // Re-renders with the same session do not navigate again.
    for _ in 0..3 {
        assert_eq!(redirect.observe(&source.current(), "/"), None);
    }
}

#[tokio::test]
async fn chat_conversation_over_shared_transport() {
    let transport = Arc::new(LoopbackTransport::new());
    let notices = NotificationCenter::default();
    let mut notice_rx = notices.subscribe();

    let channel = ChatChannel::attach(transport.clone(), Some(notices.clone()));

    // Offline send: shown locally, not delivered.
    let pending = channel.send_message("¿hay alguien?").await;
    assert!(!pending.emitted);

    transport.open();
    assert_eq!(transport.state(), ConnectionState::Connected);

    let sent = channel.send_message("hola").await;
    assert!(sent.emitted);
    transport.deliver_assistant("¡Hola! ¿En qué puedo ayudarte?", None);

    timeout(Duration::from_secs(1), async {
        while channel.len().await < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let messages = channel.messages().await;
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::User, MessageRole::Assistant]
    );
    assert_eq!(transport.sent_frames().len(), 1);

    transport.fail("server went away");
    let notice = timeout(Duration::from_secs(1), notice_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);

    // A second view on the same transport keeps working after the first detaches.
    let other = ChatChannel::attach(transport.clone(), None);
    channel.detach().await;
    transport.attempt();
    transport.open();
    transport.deliver_assistant("de vuelta", None);
    timeout(Duration::from_secs(1), async {
        while other.len().await < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(other.messages().await[0].content, "de vuelta");
}
