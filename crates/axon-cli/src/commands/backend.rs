use anyhow::Result;
use axon_client::{ApiError, BackendClient};
use axon_core::NotificationCenter;

/// Surface a failed backend call as an error notice, then propagate it.
fn report(notices: &NotificationCenter, action: &str, err: ApiError) -> anyhow::Error {
    let retry = if err.is_retryable() { " (retryable)" } else { "" };
    notices.error(format!("{action} failed: {err}{retry}"));
    anyhow::Error::new(err).context(format!("{action} failed"))
}

pub async fn run_health(client: &BackendClient, notices: &NotificationCenter) -> Result<()> {
    let health = client
        .health()
        .await
        .map_err(|e| report(notices, "health check", e))?;
    if health.is_ok() {
        println!("Backend {} is healthy.", client.base_url());
    } else {
        notices.warn(format!("backend reports status {:?}", health.status));
        println!("Backend {} status: {}", client.base_url(), health.status);
    }
    Ok(())
}

pub async fn run_catalog(client: &BackendClient, notices: &NotificationCenter) -> Result<()> {
    let catalog = client
        .catalog()
        .await
        .map_err(|e| report(notices, "catalog", e))?;
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

pub async fn run_trigger(
    client: &BackendClient,
    notices: &NotificationCenter,
    workflow: &str,
    payload: &str,
) -> Result<()> {
    let resp = client
        .trigger_flow_raw(workflow, payload)
        .await
        .map_err(|e| report(notices, "workflow trigger", e))?;
    notices.info(format!("workflow {workflow} started"));
    println!("Run ID: {}", resp.run_id);
    Ok(())
}

pub async fn run_infer(
    client: &BackendClient,
    notices: &NotificationCenter,
    provider: &str,
    input: &str,
) -> Result<()> {
    let resp = client
        .infer(provider, input)
        .await
        .map_err(|e| report(notices, "inference", e))?;
    println!("{}", resp.output);
    if let Some(usage) = resp.usage {
        eprintln!(
            "[{} / {}] prompt={} completion={}",
            resp.provider,
            resp.model,
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
        );
    }
    Ok(())
}
