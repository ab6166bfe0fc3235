//! Request and response bodies of the backend REST API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub workflow_id: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferRequest {
    pub provider: String,
    pub input: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, alias = "promptTokens", alias = "input_tokens")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, alias = "completionTokens", alias = "output_tokens")]
    pub completion_tokens: Option<u64>,
    #[serde(default, alias = "totalTokens")]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferResponse {
    pub provider: String,
    pub model: String,
    pub output: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy" | "up")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_request_uses_camel_case() {
        let req = TriggerRequest {
            workflow_id: "wf-1".into(),
            payload: serde_json::json!({"a": 1}),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["workflowId"], "wf-1");
        assert_eq!(json["payload"]["a"], 1);
    }

    #[test]
    fn infer_response_without_usage() {
        let resp: InferResponse = serde_json::from_str(
            r#"{"provider":"openai","model":"gpt-4o","output":"hola"}"#,
        )
        .unwrap();
        assert_eq!(resp.output, "hola");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn health_status_variants() {
        assert!(HealthResponse { status: "ok".into() }.is_ok());
        assert!(!HealthResponse { status: "degraded".into() }.is_ok());
    }
}
