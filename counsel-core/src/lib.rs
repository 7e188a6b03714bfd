//! # Counsel Core
//!
//! Retrieval-augmented chat orchestration for a legal document assistant.
//! Provides access-filtered hybrid retrieval with literal-identifier boosting,
//! context assembly, a streaming completion orchestrator with tool dispatch,
//! bounded session history, and citation extraction.

pub mod citation;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod records;
pub mod render;
pub mod retrieval;
pub mod router;
pub mod security;
pub mod session;
pub mod types;

// Re-export commonly used types at the crate root.
pub use citation::{CitationExtractor, Citations, MarkerGuard};
pub use classifier::{AnswerClassifier, KeywordQueryClassifier, NotFoundPhraseClassifier, QueryClassifier};
pub use completion::{CompletionTransport, MockCompletionTransport, MockScript, OpenAiCompatTransport};
pub use config::{EngineConfig, load_config, load_config_file};
pub use context::ContextAssembler;
pub use engine::{ChatEngine, ChatEngineBuilder, TurnStream};
pub use error::{CounselError, Result};
pub use orchestrator::{OrchestratorState, StreamOrchestrator, ToolCallArena};
pub use records::{ToolData, ToolResult};
pub use retrieval::{EmbeddingProvider, HybridRetriever, IndexTransport, RelevanceBooster};
pub use router::{ActionHandler, HandlerSource, ToolRouter};
pub use security::AccessPredicate;
pub use session::{InMemorySessionStore, SessionStore};
pub use types::{
    ContextBlock, Degradation, Fragment, RetrievalCandidate, Role, ToolInvocation, Turn, TurnEvent,
    TurnRequest, TurnSummary,
};
