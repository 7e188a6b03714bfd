//! REST adapter for a hosted hybrid search index.
//!
//! Sends text plus an optional `vectorQueries` leg in one request and reads
//! back `@search.score`, leaving ranking and fusion to the service.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::IndexTransport;
use crate::config::{IndexConfig, RetrievalConfig};
use crate::error::RetrievalError;
use crate::security::AccessPredicate;
use crate::types::RetrievalCandidate;

pub struct SearchServiceIndex {
    client: reqwest::Client,
    url: String,
    api_key: String,
    semantic_configuration: String,
    vector_field: String,
    vector_neighbors: usize,
}

impl SearchServiceIndex {
    pub fn new(
        index: &IndexConfig,
        retrieval: &RetrievalConfig,
        api_key: String,
    ) -> Result<Self, RetrievalError> {
        let endpoint = index
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RetrievalError::NotConfigured {
                field: "index.endpoint".into(),
            })?;
        let url = format!(
            "{}/indexes/{}/docs/search?api-version={}",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(&index.index_name),
            index.api_version
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(index.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Request {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url,
            api_key,
            semantic_configuration: index.semantic_configuration.clone(),
            vector_field: retrieval.vector_field.clone(),
            vector_neighbors: retrieval.vector_neighbors,
        })
    }

    /// Build from config, reading the key from `index.api_key_env`.
    pub fn from_env(index: &IndexConfig, retrieval: &RetrievalConfig) -> Result<Self, RetrievalError> {
        let api_key =
            std::env::var(&index.api_key_env).map_err(|_| RetrievalError::NotConfigured {
                field: index.api_key_env.clone(),
            })?;
        Self::new(index, retrieval, api_key)
    }

    fn request_body(&self, text: &str, vector: &[f32], predicate: &AccessPredicate, limit: usize) -> Value {
        let search = if text.trim().is_empty() { "*" } else { text };
        let mut body = json!({
            "search": search,
            "queryType": "semantic",
            "semanticConfiguration": self.semantic_configuration,
            "top": limit,
            "select": "title,content,file_name",
        });
        if !vector.is_empty() {
            body["vectorQueries"] = json!([{
                "kind": "vector",
                "vector": vector,
                "k": self.vector_neighbors.max(limit),
                "fields": self.vector_field,
            }]);
        }
        if let Some(filter) = predicate.to_odata_filter() {
            body["filter"] = json!(filter);
        }
        body
    }

    fn parse_results(json: &Value) -> Result<Vec<RetrievalCandidate>, RetrievalError> {
        let hits = json
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or_else(|| RetrievalError::ResponseParse {
                message: "missing 'value' array".into(),
            })?;
        Ok(hits
            .iter()
            .map(|hit| {
                let title = hit
                    .get("title")
                    .and_then(|t| t.as_str())
                    .filter(|t| !t.is_empty())
                    .unwrap_or("Untitled");
                let content = hit.get("content").and_then(|c| c.as_str()).unwrap_or("");
                let score = hit
                    .get("@search.score")
                    .and_then(|s| s.as_f64())
                    .unwrap_or(0.0);
                RetrievalCandidate::new(title, content, score)
            })
            .collect())
    }
}

#[async_trait]
impl IndexTransport for SearchServiceIndex {
    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        predicate: &AccessPredicate,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, RetrievalError> {
        let body = self.request_body(text, vector, predicate, limit);
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::ResponseParse {
                message: e.to_string(),
            })?;
        let candidates = Self::parse_results(&json)?;
        debug!(count = candidates.len(), "Search service responded");
        Ok(candidates)
    }
}
