//! OpenAI-compatible query embedding.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::RetrievalError;

/// Embeds queries through an OpenAI-compatible `/embeddings` endpoint.
///
/// Every failure is logged and reported as an empty vector.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_input_chars: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Request {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_input_chars: config.max_input_chars,
        })
    }

    /// Build from config, reading the key from `config.api_key_env`.
    /// Returns `None` when embedding is disabled or no key is set.
    pub fn from_env(config: &EmbeddingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => match Self::new(config, key) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!(error = %e, "Embedding client unavailable; retrieval will be lexical-only");
                    None
                }
            },
            _ => {
                warn!(
                    env = %config.api_key_env,
                    "Embedding API key not set; retrieval will be lexical-only"
                );
                None
            }
        }
    }

    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_input_chars) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }

    fn parse_embedding(json: &Value) -> Vec<f32> {
        json["data"][0]["embedding"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Vec<f32> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": self.truncate(text),
        });

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "Embedding request failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Embedding endpoint returned an error");
            return Vec::new();
        }

        match response.json::<Value>().await {
            Ok(json) => Self::parse_embedding(&json),
            Err(e) => {
                warn!(error = %e, "Embedding response was not JSON");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(max_input_chars: usize) -> OpenAiEmbeddingProvider {
        let config = EmbeddingConfig {
            max_input_chars,
            ..Default::default()
        };
        OpenAiEmbeddingProvider::new(&config, "test-key".into()).unwrap()
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let p = provider(3);
        assert_eq!(p.truncate("héllo"), "hél");
        assert_eq!(p.truncate("hi"), "hi");
    }

    #[test]
    fn test_parse_embedding() {
        let json = json!({"data": [{"embedding": [0.5, -1.0, 2]}]});
        assert_eq!(
            OpenAiEmbeddingProvider::parse_embedding(&json),
            vec![0.5, -1.0, 2.0]
        );
        assert!(OpenAiEmbeddingProvider::parse_embedding(&json!({"error": "x"})).is_empty());
    }

    #[test]
    fn test_disabled_provider_is_none() {
        let config = EmbeddingConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(OpenAiEmbeddingProvider::from_env(&config).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_empty_vector() {
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let p = OpenAiEmbeddingProvider::new(&config, "k".into()).unwrap();
        assert!(p.embed("query").await.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let config = EmbeddingConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 1,
            ..Default::default()
        };
        let p = OpenAiEmbeddingProvider::new(&config, "k".into()).unwrap();
        let vector = tokio::time::timeout(Duration::from_secs(5), p.embed("query"))
            .await
            .expect("request should give up on its own");
        assert!(vector.is_empty());
    }
}
