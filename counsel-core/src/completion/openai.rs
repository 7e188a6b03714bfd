//! OpenAI-compatible streaming chat completions.
//!
//! Works with OpenAI, Azure OpenAI deployments exposed through a compatible
//! gateway, Ollama, vLLM, and any endpoint following the chat completions
//! SSE format.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::CompletionTransport;
use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::types::{CompletionDelta, CompletionRequest, ToolDefinition, Turn};

pub struct OpenAiCompatTransport {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatTransport {
    /// Create a transport, reading the API key from `config.api_key_env`.
    ///
    /// Local endpoints (localhost / 127.0.0.1) do not require a key.
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let is_local =
            config.base_url.contains("localhost") || config.base_url.contains("127.0.0.1");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| CompletionError::AuthFailed {
                provider: format!("OpenAI-compatible: env var '{}' not set", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &CompletionConfig, api_key: String) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Connection {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn messages_to_json(system_prompt: &str, history: &[Turn], user_prompt: &str) -> Vec<Value> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(json!({"role": "system", "content": system_prompt}));
        for turn in history {
            messages.push(json!({"role": turn.role.to_string(), "content": turn.content}));
        }
        messages.push(json!({"role": "user", "content": user_prompt}));
        messages
    }

    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": Self::messages_to_json(&request.system_prompt, &request.history, &request.user_prompt),
            "temperature": request.temperature,
            "stream": true,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(Self::tools_to_json(&request.tools));
            body["tool_choice"] = json!("auto");
        }
        body
    }

    /// Parse a single SSE line into a JSON value.
    fn parse_sse_line(line: &str) -> Option<Value> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            return None;
        }
        serde_json::from_str(data).ok()
    }

    /// Deltas carried by one streamed chunk, in wire order.
    fn deltas_from_chunk(chunk: &Value) -> Vec<CompletionDelta> {
        let mut out = Vec::new();
        let Some(delta) = chunk
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
        else {
            return out;
        };

        if let Some(content) = delta.get("content").and_then(|c| c.as_str())
            && !content.is_empty()
        {
            out.push(CompletionDelta::Text(content.to_string()));
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for tc in tool_calls {
                let index = tc.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
                let id = tc
                    .get("id")
                    .and_then(|i| i.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                let func = tc.get("function");
                let name = func
                    .and_then(|f| f.get("name"))
                    .and_then(|n| n.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                let arguments = func
                    .and_then(|f| f.get("arguments"))
                    .and_then(|a| a.as_str())
                    .unwrap_or("")
                    .to_string();
                if id.is_some() || name.is_some() || !arguments.is_empty() {
                    out.push(CompletionDelta::ToolCall {
                        index,
                        id,
                        name,
                        arguments,
                    });
                }
            }
        }
        out
    }

    fn map_http_error(status: reqwest::StatusCode, retry_after: Option<u64>, body: &str) -> CompletionError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "Authentication failed ({})", status);
                CompletionError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => CompletionError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(5),
            },
            code if code >= 500 => CompletionError::ApiRequest {
                message: format!("Server error ({status}): {body}"),
            },
            _ => CompletionError::ApiRequest {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl CompletionTransport for OpenAiCompatTransport {
    async fn stream_chat(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<CompletionDelta>,
    ) -> Result<(), CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    CompletionError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, retry_after, &body_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CompletionError::Streaming {
                message: format!("Failed to read stream: {e}"),
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim();
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" || line == "data:[DONE]" {
                    let _ = tx.send(CompletionDelta::Done).await;
                    return Ok(());
                }
                let Some(data) = Self::parse_sse_line(line) else {
                    warn!(line = %line, "Skipping unparsable SSE line");
                    continue;
                };
                for delta in Self::deltas_from_chunk(&data) {
                    if tx.send(delta).await.is_err() {
                        return Err(CompletionError::Cancelled);
                    }
                }
            }
        }

        // Some servers close the connection without a [DONE] sentinel.
        let _ = tx.send(CompletionDelta::Done).await;
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
