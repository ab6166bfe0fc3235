use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axon_core::{AccessDecision, AxonConfig, SessionGate, StaticSession, TenantRedirect};
use axon_schema::Session;

#[derive(Debug, PartialEq)]
pub struct GateReport {
    pub decision: AccessDecision,
    /// Where the post-login redirect would send this session, if anywhere.
    pub redirect: Option<String>,
}

pub fn gate_report(config: &AxonConfig, session: &Session, route: &str) -> GateReport {
    let gate = SessionGate::new(Arc::new(StaticSession::new(session.clone())));
    let mut redirect = TenantRedirect::new(
        config.routes.portal_prefix.clone(),
        config.routes.entry_routes.clone(),
    );
    GateReport {
        decision: gate.evaluate_path(route, &config.routes.portal_prefix),
        redirect: redirect.observe(session, route),
    }
}

pub fn run_gate(config: &AxonConfig, session_path: &Path, route: &str) -> Result<()> {
    let raw = std::fs::read_to_string(session_path)
        .with_context(|| format!("reading session file {}", session_path.display()))?;
    let session: Session = serde_json::from_str(&raw)
        .with_context(|| format!("parsing session file {}", session_path.display()))?;

    let report = gate_report(config, &session, route);
    println!("Role:     {}", session.role());
    match &report.decision {
        AccessDecision::Allowed { display_name } => println!("Decision: allowed ({display_name})"),
        AccessDecision::Loading => println!("Decision: loading"),
        denied => println!("Decision: denied ({})", denied.message()),
    }
    if let Some(target) = &report.redirect {
        println!("Redirect: {target}");
    }
    Ok(())
}
