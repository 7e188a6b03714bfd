//! Hybrid retrieval over an external document index.
//!
//! The engine never owns a vector store. It talks to two narrow collaborators:
//! an [`EmbeddingProvider`] that turns the query into a vector (or nothing),
//! and an [`IndexTransport`] that runs the combined lexical and vector search.

pub mod boost;
pub mod embedding;
pub mod search_service;

pub use boost::RelevanceBooster;
pub use embedding::OpenAiEmbeddingProvider;
pub use search_service::SearchServiceIndex;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::security::AccessPredicate;
use crate::types::RetrievalCandidate;

/// Produces query embeddings.
///
/// Implementations return an empty vector on any failure and never error, so
/// the retriever can fall back to lexical-only search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Vec<f32>;
}

/// A combined lexical and nearest-neighbour search against the document index.
#[async_trait]
pub trait IndexTransport: Send + Sync {
    /// Returns candidates in the service's native relevance order.
    /// An empty `vector` means lexical-only.
    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        predicate: &AccessPredicate,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, RetrievalError>;
}

/// Outcome of one retrieval, including whether the vector leg was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub candidates: Vec<RetrievalCandidate>,
    pub lexical_only: bool,
}

/// Issues hybrid queries and preserves the service's ranking.
pub struct HybridRetriever {
    index: Arc<dyn IndexTransport>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<dyn IndexTransport>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    /// Embed the query (if an embedder is configured) and search.
    pub async fn retrieve(
        &self,
        query: &str,
        predicate: &AccessPredicate,
    ) -> Result<Retrieval, RetrievalError> {
        let vector = match &self.embedder {
            Some(embedder) => embedder.embed(query).await,
            None => Vec::new(),
        };
        self.retrieve_with_vector(query, &vector, predicate, self.config.limit)
            .await
    }

    /// Search with a caller-supplied vector. An empty vector degrades to
    /// lexical-only search.
    pub async fn retrieve_with_vector(
        &self,
        query: &str,
        vector: &[f32],
        predicate: &AccessPredicate,
        limit: usize,
    ) -> Result<Retrieval, RetrievalError> {
        let lexical_only = vector.is_empty();
        if lexical_only {
            warn!("Query embedding unavailable; falling back to lexical-only search");
        }

        let mut candidates = self
            .index
            .hybrid_search(query, vector, predicate, limit)
            .await?;
        candidates.truncate(limit);

        debug!(
            count = candidates.len(),
            lexical_only,
            predicate = %predicate,
            "Hybrid search returned candidates"
        );
        Ok(Retrieval {
            candidates,
            lexical_only,
        })
    }
}

/// Index that returns a fixed candidate list, honouring only `limit`.
///
/// Records the last request so tests can assert on what was sent.
#[derive(Default)]
pub struct StaticIndex {
    candidates: Vec<RetrievalCandidate>,
    fail: bool,
    last_request: std::sync::Mutex<Option<(String, usize, AccessPredicate, usize)>>,
}

impl StaticIndex {
    pub fn new(candidates: Vec<RetrievalCandidate>) -> Self {
        Self {
            candidates,
            fail: false,
            last_request: std::sync::Mutex::new(None),
        }
    }

    /// An index whose every search fails with a transport error.
    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
            last_request: std::sync::Mutex::new(None),
        }
    }

    /// `(text, vector_len, predicate, limit)` of the most recent search.
    pub fn last_request(&self) -> Option<(String, usize, AccessPredicate, usize)> {
        self.last_request.lock().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl IndexTransport for StaticIndex {
    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        predicate: &AccessPredicate,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, RetrievalError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((text.to_string(), vector.len(), predicate.clone(), limit));
        }
        if self.fail {
            return Err(RetrievalError::Request {
                message: "static index configured to fail".into(),
            });
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
}

/// Embedder returning a fixed vector (empty simulates an outage).
pub struct StaticEmbedder {
    vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn unavailable() -> Self {
        Self { vector: Vec::new() }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Vec<f32> {
        self.vector.clone()
    }
}
