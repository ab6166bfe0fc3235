//! Client for the backend REST API: workflow triggers, LLM inference, health
//! and catalog.

pub mod error;

use std::time::Duration;

use axon_schema::{
    HealthResponse, InferRequest, InferResponse, TriggerRequest, TriggerResponse,
};
use serde::de::DeserializeOwned;

pub use error::{ApiError, ApiErrorKind, Result};

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Fails when the HTTP client cannot be built (e.g. TLS backend init).
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /api/flows/trigger`
    pub async fn trigger_flow(
        &self,
        workflow_id: &str,
        payload: serde_json::Value,
    ) -> Result<TriggerResponse> {
        let workflow_id = workflow_id.trim();
        if workflow_id.is_empty() {
            return Err(ApiError::InvalidPayload("workflow id is required".into()));
        }
        let body = TriggerRequest {
            workflow_id: workflow_id.to_string(),
            payload,
        };
        tracing::info!(workflow_id, "triggering workflow");
        let resp: TriggerResponse = self
            .send_json(self.client.post(self.url("/api/flows/trigger")).json(&body))
            .await?;
        tracing::info!(workflow_id, run_id = %resp.run_id, "workflow triggered");
        Ok(resp)
    }

    /// Parse `raw_payload` as JSON, then trigger. Malformed JSON is rejected
    /// without sending anything; a blank payload means `{}`.
    pub async fn trigger_flow_raw(
        &self,
        workflow_id: &str,
        raw_payload: &str,
    ) -> Result<TriggerResponse> {
        let payload = parse_payload(raw_payload)?;
        self.trigger_flow(workflow_id, payload).await
    }

    /// `POST /api/llm/infer`
    pub async fn infer(&self, provider: &str, input: &str) -> Result<InferResponse> {
        if provider.trim().is_empty() {
            return Err(ApiError::InvalidPayload("provider is required".into()));
        }
        if input.trim().is_empty() {
            return Err(ApiError::InvalidPayload("input is required".into()));
        }
        let body = InferRequest {
            provider: provider.trim().to_string(),
            input: input.to_string(),
        };
        let resp: InferResponse = self
            .send_json(self.client.post(self.url("/api/llm/infer")).json(&body))
            .await?;
        tracing::debug!(provider = %resp.provider, model = %resp.model, "inference done");
        Ok(resp)
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthResponse> {
        self.send_json(self.client.get(self.url("/api/health")))
            .await
    }

    /// `GET /api/catalog`. The catalog shape is owned by the backend and is
    /// passed through untouched.
    pub async fn catalog(&self) -> Result<serde_json::Value> {
        self.send_json(self.client.get(self.url("/api/catalog")))
            .await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, "backend request failed");
            return Err(ApiError::Http {
                status,
                kind: ApiErrorKind::from_status(status),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{e}: {text}")))
    }
}

pub fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ApiError::InvalidPayload(format!("payload is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_payload_is_empty_object() {
        assert_eq!(parse_payload("  ").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn malformed_payload_rejected() {
        let err = parse_payload("{\"a\": ").unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }

    #[test]
    fn client_builds_with_custom_timeout() {
        let client =
            BackendClient::with_timeout("https://api.example.com", Duration::from_millis(250))
                .unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = BackendClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
    }
}
