//! Generic REST call on the model's behalf.

use async_trait::async_trait;
use counsel_core::error::ToolError;
use counsel_core::records::{ApiResponse, ToolData, ToolResult};
use counsel_core::router::ActionHandler;
use reqwest::Method;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::args::{opt_str, required_str};
use crate::schema;

const TOOL_NAME: &str = schema::CALL_EXTERNAL_API;

/// `call_external_api`: any method, headers, JSON body, and query string.
/// Succeeds only on a 2xx status; a non-JSON body comes back as `{"text": ...}`.
pub struct ExternalApiHandler {
    http: reqwest::Client,
}

impl ExternalApiHandler {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                name: TOOL_NAME.into(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }
}

fn invalid(reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        name: TOOL_NAME.into(),
        reason: reason.into(),
    }
}

/// Render a JSON scalar the way it should appear in a header or query string.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ActionHandler for ExternalApiHandler {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        schema::description(TOOL_NAME)
    }

    fn parameters_schema(&self) -> Value {
        schema::parameters(TOOL_NAME)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        let url = required_str(TOOL_NAME, &args, "url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(format!("url must be absolute http(s): {url}")));
        }
        let method_name = opt_str(&args, "method").unwrap_or("GET").to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| invalid(format!("unsupported method: {method_name}")))?;

        let mut builder = self.http.request(method.clone(), url);
        if let Some(headers) = args.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(value) = scalar(value) {
                    builder = builder.header(key.as_str(), value);
                }
            }
        }
        if let Some(params) = args.get("params").and_then(Value::as_object) {
            let pairs: Vec<(&str, String)> = params
                .iter()
                .filter_map(|(k, v)| scalar(v).map(|v| (k.as_str(), v)))
                .collect();
            builder = builder.query(&pairs);
        }
        if let Some(data) = args.get("data").filter(|d| !d.is_null())
            && method != Method::GET
        {
            builder = builder.json(data);
        }

        debug!(%method, url, "Calling external API");
        let response = builder.send().await.map_err(|e| ToolError::ExecutionFailed {
            name: TOOL_NAME.into(),
            message: format!("HTTP request failed: {e}"),
        })?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "text": text }));

        if !status.is_success() {
            warn!(%method, url, status = status.as_u16(), "External API call failed");
            return Ok(ToolResult::failure(format!(
                "API call failed with status {}",
                status.as_u16()
            )));
        }

        Ok(ToolResult::success(
            format!("API call succeeded with status {}", status.as_u16()),
            ToolData::ApiResponse(ApiResponse {
                status_code: status.as_u16(),
                body,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, TestServer};

    fn handler() -> ExternalApiHandler {
        ExternalApiHandler::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_relative_url_is_rejected() {
        let err = handler().call(json!({"url": "/cases"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_method_is_rejected() {
        let err = handler()
            .call(json!({"url": "http://localhost:1", "method": "NOT A METHOD"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported method"));
    }

    #[tokio::test]
    async fn test_post_with_headers_params_and_json_body() {
        let server = TestServer::start(vec![Reply::json(201, json!({"id": 7}))]).await;
        let result = handler()
            .call(json!({
                "url": format!("{}/hooks", server.url()),
                "method": "post",
                "headers": {"X-Matter": "case-001"},
                "params": {"dry_run": true, "page": 2},
                "data": {"note": "filed"}
            }))
            .await
            .unwrap();

        let request = server.requests().await.remove(0);
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/hooks?dry_run=true&page=2");
        assert_eq!(request.header("x-matter"), Some("case-001"));
        assert_eq!(request.body, r#"{"note":"filed"}"#);
        assert_eq!(
            result,
            ToolResult::success(
                "API call succeeded with status 201",
                ToolData::ApiResponse(ApiResponse {
                    status_code: 201,
                    body: json!({"id": 7}),
                }),
            )
        );
    }

    #[tokio::test]
    async fn test_plain_text_body_is_wrapped() {
        let server = TestServer::start(vec![Reply::text(200, "pong")]).await;
        let result = handler()
            .call(json!({"url": server.url()}))
            .await
            .unwrap();
        let ToolResult::Success { data: ToolData::ApiResponse(response), .. } = result else {
            panic!("expected api response");
        };
        assert_eq!(response.body, json!({"text": "pong"}));
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_failure() {
        let server = TestServer::start(vec![Reply::json(503, json!({"detail": "down"}))]).await;
        let result = handler()
            .call(json!({"url": server.url()}))
            .await
            .unwrap();
        assert_eq!(result.error_reason(), Some("API call failed with status 503"));
    }
}
