//! Chat engine: one retrieval-augmented turn from query to stored answer.
//!
//! `handle_turn` runs the whole pipeline on a spawned task and returns the
//! turn's fragments as a stream:
//!
//! security predicate → hybrid retrieval → relevance boost → context blocks →
//! streamed completion (→ tool resolution) → citations → session update.
//!
//! Every recoverable condition is reported as a [`Degradation`] in the closing
//! [`TurnSummary`]. Only a session store failure ends the stream with an error.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::citation::{CitationExtractor, cited_indices};
use crate::classifier::{
    AnswerClassifier, KeywordQueryClassifier, NotFoundPhraseClassifier, QueryClassifier,
};
use crate::completion::{CompletionTransport, OpenAiCompatTransport};
use crate::config::EngineConfig;
use crate::context::ContextAssembler;
use crate::error::{ConfigError, CounselError};
use crate::orchestrator::{EventSender, ResolvedCall, StreamOrchestrator};
use crate::prompt::PromptBuilder;
use crate::records::{FailureKind, ToolResult};
use crate::render;
use crate::retrieval::{
    EmbeddingProvider, HybridRetriever, IndexTransport, OpenAiEmbeddingProvider,
    RelevanceBooster, SearchServiceIndex,
};
use crate::router::ToolRouter;
use crate::security::AccessPredicate;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::types::{
    CompletionRequest, Degradation, Fragment, Turn, TurnEvent, TurnRequest,
    TurnSummary, document_count,
};

/// Stream of one turn's output.
pub type TurnStream = ReceiverStream<Result<TurnEvent, CounselError>>;

pub struct ChatEngine {
    config: EngineConfig,
    retriever: HybridRetriever,
    booster: RelevanceBooster,
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionTransport>,
    router: Arc<ToolRouter>,
    sessions: Arc<dyn SessionStore>,
    query_classifier: Box<dyn QueryClassifier>,
    answer_classifier: Box<dyn AnswerClassifier>,
    prompts: PromptBuilder,
    citations: CitationExtractor,
}

/// Assembles a [`ChatEngine`]. The index and completion transport are required.
pub struct ChatEngineBuilder {
    config: EngineConfig,
    index: Option<Arc<dyn IndexTransport>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionTransport>>,
    router: Option<Arc<ToolRouter>>,
    sessions: Option<Arc<dyn SessionStore>>,
    query_classifier: Option<Box<dyn QueryClassifier>>,
    answer_classifier: Option<Box<dyn AnswerClassifier>>,
    prompts: Option<PromptBuilder>,
}

impl ChatEngineBuilder {
    pub fn index(mut self, index: Arc<dyn IndexTransport>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn CompletionTransport>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn router(mut self, router: ToolRouter) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn query_classifier(mut self, classifier: impl QueryClassifier + 'static) -> Self {
        self.query_classifier = Some(Box::new(classifier));
        self
    }

    pub fn answer_classifier(mut self, classifier: impl AnswerClassifier + 'static) -> Self {
        self.answer_classifier = Some(Box::new(classifier));
        self
    }

    pub fn prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn build(self) -> Result<ChatEngine, ConfigError> {
        self.config.validate()?;
        let index = self.index.ok_or_else(|| ConfigError::Invalid {
            message: "no document index configured".into(),
        })?;
        let completion = self.completion.ok_or_else(|| ConfigError::Invalid {
            message: "no completion transport configured".into(),
        })?;
        let config = self.config;

        Ok(ChatEngine {
            retriever: HybridRetriever::new(index, self.embedder, config.retrieval.clone()),
            booster: RelevanceBooster::new(config.relevance.clone()),
            assembler: ContextAssembler::new(config.context.per_document_chars),
            completion,
            router: self.router.unwrap_or_default(),
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new(config.session.max_turns))),
            query_classifier: self
                .query_classifier
                .unwrap_or_else(|| Box::new(KeywordQueryClassifier::new())),
            answer_classifier: self
                .answer_classifier
                .unwrap_or_else(|| Box::new(NotFoundPhraseClassifier::new())),
            prompts: self.prompts.unwrap_or_default(),
            citations: CitationExtractor::new(),
            config,
        })
    }
}

impl ChatEngine {
    pub fn builder(config: EngineConfig) -> ChatEngineBuilder {
        ChatEngineBuilder {
            config,
            index: None,
            embedder: None,
            completion: None,
            router: None,
            sessions: None,
            query_classifier: None,
            answer_classifier: None,
            prompts: None,
        }
    }

    /// Build an engine backed by the HTTP transports named in `config`,
    /// reading credentials from the environment.
    pub fn from_config(config: EngineConfig, router: ToolRouter) -> Result<Self, CounselError> {
        let index = SearchServiceIndex::from_env(&config.index, &config.retrieval)?;
        let completion = OpenAiCompatTransport::new(&config.completion)?;
        let mut builder = Self::builder(config.clone())
            .index(Arc::new(index))
            .completion(Arc::new(completion))
            .router(router);
        if let Some(embedder) = OpenAiEmbeddingProvider::from_env(&config.embedding) {
            builder = builder.embedder(Arc::new(embedder));
        }
        Ok(builder.build()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Run one turn. Fragments arrive as they are produced; the stream closes
    /// with [`TurnEvent::Finished`] unless the turn is cancelled or fails.
    ///
    /// Cancelling `cancel` stops retrieval and the completion stream. Dropping
    /// the stream counts as cancellation: the turn stops at its next fragment,
    /// or before the next tool call, and nothing is written to the session. A
    /// tool call already dispatched runs to completion.
    pub fn handle_turn(self: &Arc<Self>, request: TurnRequest, cancel: CancellationToken) -> TurnStream {
        let (tx, rx) = mpsc::channel(64);
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_turn(request, &cancel, &tx).await {
                warn!(error = %e, "Turn failed");
                let _ = tx.send(Err(e)).await;
            }
        });
        ReceiverStream::new(rx)
    }

    /// Run one turn to completion and concatenate its fragments.
    pub async fn collect_turn(
        self: &Arc<Self>,
        request: TurnRequest,
    ) -> Result<(String, TurnSummary), CounselError> {
        let mut stream = self.handle_turn(request, CancellationToken::new());
        let mut output = String::new();
        let mut summary = TurnSummary::default();
        while let Some(event) = stream.next().await {
            match event? {
                TurnEvent::Fragment(fragment) => output.push_str(fragment.as_str()),
                TurnEvent::Finished(s) => summary = s,
            }
        }
        Ok((output, summary))
    }

    async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: &CancellationToken,
        out: &EventSender,
    ) -> Result<(), CounselError> {
        let session_id = request
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let history = self.sessions.read(&session_id)?;
        let mut degradations = Vec::new();

        info!(
            session = %session_id,
            history_turns = history.len(),
            security = request.security_enabled,
            "Handling turn"
        );

        // Retrieval
        let predicate = AccessPredicate::build(request.user_id.as_deref(), request.security_enabled);
        let retrieval = tokio::select! {
            _ = cancel.cancelled() => {
                info!(session = %session_id, "Turn cancelled during retrieval");
                return Ok(());
            }
            r = self.retriever.retrieve(&request.message, &predicate) => r,
        };
        let candidates = match retrieval {
            Ok(r) => {
                if r.lexical_only {
                    degradations.push(Degradation::RetrievalDegraded);
                }
                r.candidates
            }
            Err(e) => {
                warn!(error = %e, "Document search failed; continuing without evidence");
                Vec::new()
            }
        };
        let candidates = self.booster.boost(candidates, &request.message);
        let blocks = self.assembler.assemble(&candidates);
        let block_count = document_count(&blocks);
        if block_count == 0 {
            degradations.push(Degradation::NoEvidenceFound);
        }
        debug!(documents = block_count, "Context assembled");

        // Completion
        let document_question = self.query_classifier.is_document_question(&request.message);
        let tools = if self.config.actions.enabled && request.functions_enabled {
            self.router.definitions()
        } else {
            Vec::new()
        };
        let completion_request = CompletionRequest {
            system_prompt: self.prompts.system_prompt(document_question),
            history,
            user_prompt: self.prompts.user_prompt(&request.message, &blocks, document_question),
            tools,
            temperature: self.config.completion.temperature,
            max_tokens: Some(self.config.completion.max_tokens),
            model: Some(self.config.completion.model.clone()),
        };

        let mut orchestrator = StreamOrchestrator::new(self.completion.clone(), self.router.clone());
        let outcome = orchestrator.run(completion_request, cancel, out).await;
        if outcome.cancelled {
            info!(session = %session_id, "Turn cancelled; history left unchanged");
            return Ok(());
        }

        if let Some(err) = outcome.transport_error {
            degradations.push(Degradation::CompletionTransportFailed {
                reason: err.to_string(),
            });
            let notice = if block_count > 0 {
                render::fallback_summary(&blocks)
            } else {
                render::no_documents(&request.message)
            };
            emit(out, Fragment::Notice(notice)).await;
            finish(
                out,
                TurnSummary {
                    session_id,
                    cited_indices: Vec::new(),
                    tool_invocations: outcome.invocations.len(),
                    degradations,
                },
            )
            .await;
            return Ok(());
        }

        degradations.extend(outcome.resolved.iter().filter_map(tool_degradation));

        // Citations
        let citations = self.citations.extract(&outcome.text, block_count);
        let answer = self.citations.strip_code_fences(&citations.cleaned_text);
        let not_found = self.answer_classifier.asserts_not_found(&answer);
        if not_found && block_count > 0 {
            degradations.push(Degradation::ModelAssertsNotFound);
        }
        let cited = cited_indices(&citations.used_indices, block_count, not_found);

        if block_count == 0 {
            emit(out, Fragment::Notice(render::no_documents(&request.message))).await;
        } else if !cited.is_empty() {
            emit(out, Fragment::Notice(render::sources(&blocks, &cited))).await;
        }

        if out.is_closed() {
            info!(session = %session_id, "Client disconnected; history left unchanged");
            return Ok(());
        }
        self.sessions.append(
            &session_id,
            Turn::user(request.message.clone()),
            Turn::assistant(answer),
        )?;

        info!(
            session = %session_id,
            cited = ?cited,
            tool_calls = outcome.resolved.len(),
            degradations = degradations.len(),
            "Turn complete"
        );
        finish(
            out,
            TurnSummary {
                session_id,
                cited_indices: cited,
                tool_invocations: outcome.invocations.len(),
                degradations,
            },
        )
        .await;
        Ok(())
    }
}

fn tool_degradation(call: &ResolvedCall) -> Option<Degradation> {
    let function = call.invocation.function_name.clone();
    match &call.result {
        ToolResult::Success { .. } => None,
        ToolResult::Failure {
            kind: FailureKind::InvalidArguments,
            ..
        } => Some(Degradation::ToolArgumentInvalid { function }),
        ToolResult::Failure { reason, .. } => Some(Degradation::ToolExecutionFailed {
            function,
            reason: reason.clone(),
        }),
    }
}

async fn emit(out: &EventSender, fragment: Fragment) {
    let _ = out.send(Ok(TurnEvent::Fragment(fragment))).await;
}

async fn finish(out: &EventSender, summary: TurnSummary) {
    let _ = out.send(Ok(TurnEvent::Finished(summary))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{MockCompletionTransport, MockScript};
    use crate::retrieval::{StaticEmbedder, StaticIndex};
    use crate::error::ToolError;
    use crate::records::ToolData;
    use crate::router::ActionHandler;
    use crate::types::RetrievalCandidate;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _args: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::success("ok", ToolData::Empty))
        }
    }

    fn engine(index: StaticIndex, completion: MockCompletionTransport) -> Arc<ChatEngine> {
        Arc::new(
            ChatEngine::builder(EngineConfig::default())
                .index(Arc::new(index))
                .embedder(Arc::new(StaticEmbedder::new(vec![0.1, 0.2])))
                .completion(Arc::new(completion))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_builder_requires_transports() {
        assert!(ChatEngine::builder(EngineConfig::default()).build().is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.retrieval.limit = 0;
        let result = ChatEngine::builder(config)
            .index(Arc::new(StaticIndex::new(Vec::new())))
            .completion(Arc::new(MockCompletionTransport::new()))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generates_session_id_when_absent() {
        let engine = engine(StaticIndex::new(Vec::new()), MockCompletionTransport::new());
        let (_, summary) = engine.collect_turn(TurnRequest::new("hello")).await.unwrap();
        assert!(Uuid::parse_str(&summary.session_id).is_ok());
    }

    #[tokio::test]
    async fn test_blank_session_id_replaced() {
        let engine = engine(StaticIndex::new(Vec::new()), MockCompletionTransport::new());
        let (_, summary) = engine
            .collect_turn(TurnRequest::new("hello").with_session("  "))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&summary.session_id).is_ok());
    }

    #[tokio::test]
    async fn test_tools_withheld_when_functions_disabled() {
        let completion = Arc::new(MockCompletionTransport::new());
        let mut router = ToolRouter::new();
        router
            .register_external(Arc::new(Echo))
            .unwrap();
        let engine = Arc::new(
            ChatEngine::builder(EngineConfig::default())
                .index(Arc::new(StaticIndex::new(vec![RetrievalCandidate::new(
                    "A.pdf", "alpha", 1.0,
                )])))
                .completion(completion.clone())
                .router(router)
                .build()
                .unwrap(),
        );

        engine
            .collect_turn(TurnRequest::new("q").with_functions(false))
            .await
            .unwrap();
        engine.collect_turn(TurnRequest::new("q")).await.unwrap();
        let requests = completion.requests();
        assert!(requests[0].tools.is_empty());
        assert_eq!(requests[1].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_answer_is_stored_without_marker() {
        let completion = MockCompletionTransport::with_script(MockScript::text(
            "```html\n<p>Two years.</p>\n```<!-- SOURCES: 1 -->",
        ));
        let engine = engine(
            StaticIndex::new(vec![RetrievalCandidate::new("NDA.pdf", "Term: two years", 2.0)]),
            completion,
        );
        let (_, summary) = engine
            .collect_turn(TurnRequest::new("How long is the term?").with_session("s1"))
            .await
            .unwrap();
        assert_eq!(summary.cited_indices, vec![1]);
        let turns = engine.sessions().read("s1").unwrap();
        assert_eq!(turns[1].content, "<p>Two years.</p>");
    }
}
