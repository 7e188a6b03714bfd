//! Configuration system for Counsel.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/counsel/config.toml` and/or `.counsel/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for the Counsel engine and its collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub relevance: RelevanceConfig,
    pub context: ContextConfig,
    pub session: SessionConfig,
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub actions: ActionsConfig,
}

/// Hybrid search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of candidates requested from the index.
    pub limit: usize,
    /// Nearest neighbours requested on the vector leg before fusion.
    pub vector_neighbors: usize,
    /// Index field holding the document embedding.
    pub vector_field: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            vector_neighbors: 50,
            vector_field: "content_vector".to_string(),
        }
    }
}

/// Tuning of the literal-overlap booster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Candidates scoring below this fraction of the top score are dropped.
    pub drop_ratio: f64,
    /// Multiplier applied for a perfect overlap.
    pub max_boost: f64,
    /// Weight of one identifier match relative to one word match.
    pub identifier_weight: usize,
    /// Query words shorter than this (in chars) are ignored.
    pub min_word_len: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            drop_ratio: 0.50,
            max_boost: 5.0,
            identifier_weight: 3,
            min_word_len: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Per-document character budget.
    pub per_document_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            per_document_chars: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum stored turns per session. Must be even.
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// Streaming chat completion endpoint (OpenAI-compatible).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 120,
        }
    }
}

/// Embedding endpoint (OpenAI-compatible).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// Input is truncated to this many characters before embedding.
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_input_chars: 8000,
            timeout_secs: 30,
        }
    }
}

/// Hosted search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Service endpoint, e.g. `https://<name>.search.windows.net`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub index_name: String,
    pub api_key_env: String,
    pub api_version: String,
    pub semantic_configuration: String,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index_name: "legal-documents".to_string(),
            api_key_env: "SEARCH_API_KEY".to_string(),
            api_version: "2024-07-01".to_string(),
            semantic_configuration: "default".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Function calling and action handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Offer tools to the model at all.
    pub enabled: bool,
    /// Local SQLite store. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    pub legal_api_base_url: String,
    pub handler_timeout_secs: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None,
            legal_api_base_url: "http://localhost:3001".to_string(),
            handler_timeout_secs: 30,
        }
    }
}

impl ActionsConfig {
    /// Resolve the SQLite path, falling back to `<data dir>/legal.db`.
    pub fn resolved_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        directories::ProjectDirs::from("dev", "counsel", "counsel")
            .map(|dirs| dirs.data_dir().join("legal.db"))
            .unwrap_or_else(|| PathBuf::from("legal.db"))
    }
}

impl EngineConfig {
    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.retrieval.limit == 0 {
            return invalid("retrieval.limit must be positive".into());
        }
        if self.context.per_document_chars == 0 {
            return invalid("context.per_document_chars must be positive".into());
        }
        if self.session.max_turns == 0 {
            return invalid("session.max_turns must be positive".into());
        }
        if self.session.max_turns % 2 != 0 {
            return invalid(format!(
                "session.max_turns must be even so user/assistant pairs stay intact, got {}",
                self.session.max_turns
            ));
        }
        if !(0.0..=1.0).contains(&self.relevance.drop_ratio) {
            return invalid(format!(
                "relevance.drop_ratio must be within [0, 1], got {}",
                self.relevance.drop_ratio
            ));
        }
        if self.relevance.max_boost.is_nan() || self.relevance.max_boost < 1.0 {
            return invalid(format!(
                "relevance.max_boost must be at least 1, got {}",
                self.relevance.max_boost
            ));
        }
        if self.completion.max_tokens == 0 {
            return invalid("completion.max_tokens must be positive".into());
        }
        if self.embedding.timeout_secs == 0 || self.index.timeout_secs == 0 {
            return invalid("embedding.timeout_secs and index.timeout_secs must be positive".into());
        }
        if self.actions.handler_timeout_secs == 0 {
            return invalid("actions.handler_timeout_secs must be positive".into());
        }
        Ok(())
    }
}

/// Load configuration by merging defaults, config files, and environment variables.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&EngineConfig>,
) -> Result<EngineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "counsel", "counsel") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".counsel").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (COUNSEL_COMPLETION__MODEL, COUNSEL_SESSION__MAX_TURNS, etc.)
    figment = figment.merge(Env::prefixed("COUNSEL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load a single explicit config file over the defaults, then apply the environment.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("COUNSEL_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}
