//! Core types shared across the Counsel engine.
//!
//! Conversation turns, retrieval candidates, context blocks, streaming
//! completion deltas, tool invocations, and the events a turn emits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One stored conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A passage returned by the document index for the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub title: String,
    pub raw_content: String,
    pub raw_score: f64,
    /// Equal to `raw_score` until the relevance booster rescales it.
    pub boosted_score: f64,
}

impl RetrievalCandidate {
    pub fn new(title: impl Into<String>, raw_content: impl Into<String>, raw_score: f64) -> Self {
        Self {
            title: title.into(),
            raw_content: raw_content.into(),
            raw_score,
            boosted_score: raw_score,
        }
    }
}

/// One numbered unit of prompt context.
///
/// Document indices are 1-based and stable for the lifetime of one turn; they
/// are the only identifiers a citation marker may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextBlock {
    Document {
        index: usize,
        title: String,
        content: String,
    },
    /// Stands in for an empty retrieval so the prompt is never contextless.
    NoRelevantDocuments,
}

impl ContextBlock {
    pub fn is_document(&self) -> bool {
        matches!(self, ContextBlock::Document { .. })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            ContextBlock::Document { title, .. } => Some(title),
            ContextBlock::NoRelevantDocuments => None,
        }
    }
}

/// Number of real document blocks, excluding the sentinel.
pub fn document_count(blocks: &[ContextBlock]) -> usize {
    blocks.iter().filter(|b| b.is_document()).count()
}

/// A tool the completion model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// A single incremental event from the completion transport.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionDelta {
    /// Visible text to forward immediately.
    Text(String),
    /// A fragment of a tool call keyed by its stream-local index. Only the first
    /// delta at an index is expected to carry `id` and `name`.
    ToolCall {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    /// The stream finished normally.
    Done,
}

/// A fully accumulated tool call, immutable once the stream has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub stream_index: u32,
    pub id: String,
    pub function_name: String,
    pub arguments: String,
}

/// A request to the completion transport.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<Turn>,
    pub user_prompt: String,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub model: Option<String>,
}

/// Caller input for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub security_enabled: bool,
    pub functions_enabled: bool,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            user_id: None,
            security_enabled: true,
            functions_enabled: true,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_security(mut self, enabled: bool) -> Self {
        self.security_enabled = enabled;
        self
    }

    pub fn with_functions(mut self, enabled: bool) -> Self {
        self.functions_enabled = enabled;
        self
    }
}

/// A rendered piece of turn output. Concatenating fragments in emission order
/// yields the full turn output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "html", rename_all = "snake_case")]
pub enum Fragment {
    /// Model text, forwarded as it streams.
    Text(String),
    /// A self-contained formatted tool-result block (or the banner before them).
    ToolBlock(String),
    /// Sources list, not-found notice, or fallback evidence summary.
    Notice(String),
}

impl Fragment {
    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Text(s) | Fragment::ToolBlock(s) | Fragment::Notice(s) => s,
        }
    }
}

/// Locally recovered conditions observed during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// No query vector was available; the search ran lexical-only.
    RetrievalDegraded,
    /// No candidate survived retrieval and relevance filtering.
    NoEvidenceFound,
    /// A tool call's arguments did not parse as a JSON object.
    ToolArgumentInvalid { function: String },
    /// A handler reported failure or could not be resolved.
    ToolExecutionFailed { function: String, reason: String },
    /// The completion stream failed; a raw evidence summary was emitted instead.
    CompletionTransportFailed { reason: String },
    /// The model said the answer is not in the documents; citations suppressed.
    ModelAssertsNotFound,
}

/// Closes every turn stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TurnSummary {
    pub session_id: String,
    /// 1-based document indices shown as sources.
    pub cited_indices: Vec<usize>,
    pub tool_invocations: usize,
    pub degradations: Vec<Degradation>,
}

/// An item of a turn's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Fragment(Fragment),
    Finished(TurnSummary),
}
