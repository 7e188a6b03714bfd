//! Stream Orchestrator: drives one streaming completion and resolves the
//! tool calls it produced.
//!
//! The completion transport runs on its own task and pushes deltas into a
//! channel. Text is forwarded to the caller as it arrives (minus the citation
//! marker); tool-call fragments are accumulated per stream index and only
//! dispatched after the stream has ended.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::citation::MarkerGuard;
use crate::completion::CompletionTransport;
use crate::error::{CompletionError, CounselError};
use crate::records::ToolResult;
use crate::render;
use crate::router::ToolRouter;
use crate::types::{CompletionDelta, CompletionRequest, Fragment, ToolInvocation, TurnEvent};

/// Sending half of a turn's output stream.
pub type EventSender = mpsc::Sender<Result<TurnEvent, CounselError>>;

/// Lifecycle of one orchestrated completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Streaming,
    ToolResolution,
    Done,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "idle"),
            OrchestratorState::Streaming => write!(f, "streaming"),
            OrchestratorState::ToolResolution => write!(f, "tool_resolution"),
            OrchestratorState::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Default)]
struct InvocationBuilder {
    id: Option<String>,
    function_name: Option<String>,
    arguments: String,
}

/// Tool-call builders keyed by stream index.
///
/// `id` and `function_name` are taken from the first delta that carries them
/// at an index; argument fragments are concatenated in arrival order.
#[derive(Debug, Default)]
pub struct ToolCallArena {
    builders: BTreeMap<u32, InvocationBuilder>,
}

impl ToolCallArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, index: u32, id: Option<String>, name: Option<String>, fragment: &str) {
        let builder = self.builders.entry(index).or_default();
        if builder.id.is_none() {
            builder.id = id.filter(|s| !s.is_empty());
        }
        if builder.function_name.is_none() {
            builder.function_name = name.filter(|s| !s.is_empty());
        }
        builder.arguments.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Freeze the builders into invocations ordered by stream index.
    pub fn finalize(self) -> Vec<ToolInvocation> {
        self.builders
            .into_iter()
            .map(|(index, b)| ToolInvocation {
                stream_index: index,
                id: b.id.unwrap_or_else(|| format!("call_{index}")),
                function_name: b.function_name.unwrap_or_default(),
                arguments: b.arguments,
            })
            .collect()
    }
}

/// Parse an accumulated argument buffer. Anything but a single JSON object is
/// rejected; an empty buffer reads as `{}`.
pub fn parse_arguments(buffer: &str) -> Result<Value, String> {
    if buffer.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("Failed to parse function arguments: expected a JSON object".to_string()),
        Err(e) => Err(format!("Failed to parse function arguments: {e}")),
    }
}

/// One invocation and the result it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
}

/// Everything one orchestrated completion produced.
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// Raw accumulated model text, marker included.
    pub text: String,
    pub invocations: Vec<ToolInvocation>,
    pub resolved: Vec<ResolvedCall>,
    /// Set when the transport failed mid-stream; tool calls are then skipped.
    pub transport_error: Option<CompletionError>,
    /// The caller went away or the turn was cancelled.
    pub cancelled: bool,
}

pub struct StreamOrchestrator {
    transport: Arc<dyn CompletionTransport>,
    router: Arc<ToolRouter>,
    state: OrchestratorState,
}

impl StreamOrchestrator {
    pub fn new(transport: Arc<dyn CompletionTransport>, router: Arc<ToolRouter>) -> Self {
        Self {
            transport,
            router,
            state: OrchestratorState::Idle,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = %self.state, to = %next, "Orchestrator transition");
        self.state = next;
    }

    /// Stream the completion, then resolve any accumulated tool calls.
    pub async fn run(
        &mut self,
        request: CompletionRequest,
        cancel: &CancellationToken,
        out: &EventSender,
    ) -> StreamOutcome {
        let mut outcome = self.stream(request, cancel, out).await;
        if self.state == OrchestratorState::ToolResolution {
            outcome.resolved = self.resolve_tools(&outcome.invocations, cancel, out).await;
            if outcome.resolved.len() < outcome.invocations.len() || out.is_closed() {
                outcome.cancelled = true;
            }
            self.transition(OrchestratorState::Done);
        }
        outcome
    }

    /// Consume the completion stream, forwarding text immediately.
    pub async fn stream(
        &mut self,
        request: CompletionRequest,
        cancel: &CancellationToken,
        out: &EventSender,
    ) -> StreamOutcome {
        self.transition(OrchestratorState::Streaming);
        let mut outcome = StreamOutcome::default();
        let (tx, mut rx) = mpsc::channel(64);

        let transport = self.transport.clone();
        let producer = tokio::spawn(async move { transport.stream_chat(request, tx).await });

        let mut guard = MarkerGuard::new();
        let mut arena = ToolCallArena::new();

        loop {
            let delta = tokio::select! {
                _ = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                delta = rx.recv() => delta,
            };
            match delta {
                Some(CompletionDelta::Text(text)) => {
                    outcome.text.push_str(&text);
                    let visible = guard.push(&text);
                    if !visible.is_empty() && !send_text(out, visible).await {
                        outcome.cancelled = true;
                        break;
                    }
                }
                Some(CompletionDelta::ToolCall {
                    index,
                    id,
                    name,
                    arguments,
                }) => arena.apply(index, id, name, &arguments),
                Some(CompletionDelta::Done) | None => break,
            }
        }

        if outcome.cancelled {
            producer.abort();
            info!("Turn cancelled while streaming");
            self.transition(OrchestratorState::Done);
            return outcome;
        }

        let tail = guard.finish();
        if !tail.is_empty() && !send_text(out, tail).await {
            outcome.cancelled = true;
        }

        // Nothing is read past `Done`.
        drop(rx);
        outcome.transport_error = match producer.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(join_error) => Some(CompletionError::Streaming {
                message: format!("completion task failed: {join_error}"),
            }),
        };

        outcome.invocations = arena.finalize();
        if let Some(err) = &outcome.transport_error {
            warn!(
                error = %err,
                pending_calls = outcome.invocations.len(),
                "Completion stream failed"
            );
            self.transition(OrchestratorState::Done);
        } else if outcome.cancelled || outcome.invocations.is_empty() {
            self.transition(OrchestratorState::Done);
        } else {
            self.transition(OrchestratorState::ToolResolution);
        }
        outcome
    }

    /// Dispatch invocations one at a time, in stream-index order, emitting a
    /// rendered block for each. Stops before starting a new call once the turn
    /// is cancelled or the receiving side of `out` is gone; a call already
    /// dispatched is allowed to finish and its result is kept.
    pub async fn resolve_tools(
        &mut self,
        invocations: &[ToolInvocation],
        cancel: &CancellationToken,
        out: &EventSender,
    ) -> Vec<ResolvedCall> {
        let mut resolved = Vec::with_capacity(invocations.len());
        if invocations.is_empty() {
            return resolved;
        }
        let banner = Fragment::ToolBlock(render::tools_banner());
        if out.send(Ok(TurnEvent::Fragment(banner))).await.is_err() {
            info!(skipped = invocations.len(), "Client disconnected; no tool calls dispatched");
            return resolved;
        }

        for invocation in invocations {
            if cancel.is_cancelled() || out.is_closed() {
                info!(
                    remaining = invocations.len() - resolved.len(),
                    disconnected = out.is_closed(),
                    "Turn cancelled; skipping remaining tool calls"
                );
                break;
            }

            let result = match parse_arguments(&invocation.arguments) {
                Ok(args) => self.router.dispatch(&invocation.function_name, args).await,
                Err(reason) => {
                    warn!(
                        tool = %invocation.function_name,
                        call_id = %invocation.id,
                        "Unparsable tool arguments"
                    );
                    ToolResult::invalid_arguments(reason)
                }
            };

            let block = render::tool_result(&invocation.function_name, &result);
            let delivered = out
                .send(Ok(TurnEvent::Fragment(Fragment::ToolBlock(block))))
                .await
                .is_ok();
            resolved.push(ResolvedCall {
                invocation: invocation.clone(),
                result,
            });
            if !delivered {
                info!(
                    tool = %invocation.function_name,
                    remaining = invocations.len() - resolved.len(),
                    "Client disconnected; skipping remaining tool calls"
                );
                break;
            }
        }
        resolved
    }
}

async fn send_text(out: &EventSender, text: String) -> bool {
    out.send(Ok(TurnEvent::Fragment(Fragment::Text(text))))
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{MockCompletionTransport, MockScript};
    use crate::error::ToolError;
    use crate::records::{FailureKind, ToolData};
    use crate::router::ActionHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records arguments"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
            self.seen.lock().unwrap().push(args);
            Ok(ToolResult::success("recorded", ToolData::Empty))
        }
    }

    fn router_with(name: &'static str) -> (Arc<ToolRouter>, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = ToolRouter::new();
        router
            .register_local(Arc::new(Recorder {
                name,
                seen: seen.clone(),
            }))
            .unwrap();
        (Arc::new(router), seen)
    }

    fn drain(rx: &mut mpsc::Receiver<Result<TurnEvent, CounselError>>) -> Vec<Fragment> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Ok(TurnEvent::Fragment(f)) = event {
                out.push(f);
            }
        }
        out
    }

    #[test]
    fn test_arena_concatenates_fragments_per_index() {
        let mut arena = ToolCallArena::new();
        arena.apply(0, Some("call_a".into()), Some("get_case_details".into()), "{\"case");
        arena.apply(0, None, None, "_id\":\"c-1\"}");
        let calls = arena.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, "{\"case_id\":\"c-1\"}");
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].function_name, "get_case_details");
        assert_eq!(parse_arguments(&calls[0].arguments).unwrap(), json!({"case_id": "c-1"}));
    }

    #[test]
    fn test_arena_interleaved_indices_ordered() {
        let mut arena = ToolCallArena::new();
        arena.apply(1, Some("b".into()), Some("second".into()), "{");
        arena.apply(0, Some("a".into()), Some("first".into()), "{}");
        arena.apply(1, None, None, "}");
        let calls = arena.finalize();
        let names: Vec<_> = calls.iter().map(|c| c.function_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn test_arena_keeps_first_id_and_name() {
        let mut arena = ToolCallArena::new();
        arena.apply(0, Some("first".into()), Some("x".into()), "");
        arena.apply(0, Some("second".into()), Some("y".into()), "");
        let calls = arena.finalize();
        assert_eq!(calls[0].id, "first");
        assert_eq!(calls[0].function_name, "x");
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert!(parse_arguments("[1]").is_err());
        assert!(parse_arguments("{\"a\":").unwrap_err().starts_with("Failed to parse"));
    }

    #[tokio::test]
    async fn test_text_only_goes_straight_to_done() {
        let transport = Arc::new(MockCompletionTransport::with_script(
            MockScript::text("Hello ").then_text("world<!-- SOURCES: 1 -->"),
        ));
        let (router, _) = router_with("noop");
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, mut rx) = mpsc::channel(32);

        let outcome = orch.run(CompletionRequest::default(), &CancellationToken::new(), &tx).await;
        assert_eq!(orch.state(), OrchestratorState::Done);
        assert_eq!(outcome.text, "Hello world<!-- SOURCES: 1 -->");
        assert!(outcome.invocations.is_empty());
        let visible: String = drain(&mut rx).iter().map(|f| f.as_str().to_string()).collect();
        assert_eq!(visible, "Hello world");
    }

    #[tokio::test]
    async fn test_tool_calls_resolved_after_stream() {
        let transport = Arc::new(MockCompletionTransport::with_script(
            MockScript::text("Looking that up.")
                .then_tool_call(0, "call_1", "get_case_details", &["{\"case", "_id\":\"c-1\"}"]),
        ));
        let (router, seen) = router_with("get_case_details");
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, mut rx) = mpsc::channel(32);

        let outcome = orch.run(CompletionRequest::default(), &CancellationToken::new(), &tx).await;
        assert_eq!(outcome.resolved.len(), 1);
        assert!(outcome.resolved[0].result.is_success());
        assert_eq!(seen.lock().unwrap()[0], json!({"case_id": "c-1"}));

        let fragments = drain(&mut rx);
        assert_eq!(fragments[0], Fragment::Text("Looking that up.".into()));
        assert!(fragments[1].as_str().contains("Executing actions"));
        assert!(fragments[2].as_str().contains("Action Completed: get_case_details"));
    }

    #[tokio::test]
    async fn test_bad_arguments_do_not_abort_siblings() {
        let transport = Arc::new(MockCompletionTransport::with_script(
            MockScript::new()
                .then_tool_call(0, "c0", "get_case_details", &["{not json"])
                .then_tool_call(1, "c1", "get_case_details", &["{}"])
                .then_tool_call(2, "c2", "launch_rocket", &["{}"]),
        ));
        let (router, seen) = router_with("get_case_details");
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, _rx) = mpsc::channel(32);

        let outcome = orch.run(CompletionRequest::default(), &CancellationToken::new(), &tx).await;
        let kinds: Vec<_> = outcome
            .resolved
            .iter()
            .map(|r| match &r.result {
                ToolResult::Success { .. } => None,
                ToolResult::Failure { kind, .. } => Some(*kind),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(FailureKind::InvalidArguments),
                None,
                Some(FailureKind::UnknownFunction)
            ]
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_skips_tools() {
        let transport = Arc::new(MockCompletionTransport::with_script(
            MockScript::text("partial")
                .then_tool_call(0, "c0", "get_case_details", &["{}"])
                .then_fail("connection reset"),
        ));
        let (router, seen) = router_with("get_case_details");
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, _rx) = mpsc::channel(32);

        let outcome = orch.run(CompletionRequest::default(), &CancellationToken::new(), &tx).await;
        assert!(matches!(outcome.transport_error, Some(CompletionError::Streaming { .. })));
        assert!(outcome.resolved.is_empty());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(orch.state(), OrchestratorState::Done);
    }

    /// Drops the turn's receiver the first time it runs, as a client closing
    /// its connection mid-turn would.
    struct Disconnecting {
        calls: Arc<Mutex<Vec<String>>>,
        receiver: Mutex<Option<mpsc::Receiver<Result<TurnEvent, CounselError>>>>,
    }

    #[async_trait]
    impl ActionHandler for Disconnecting {
        fn name(&self) -> &str {
            "create_legal_case"
        }
        fn description(&self) -> &str {
            "creates a case"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
            self.calls.lock().unwrap().push(args["title"].as_str().unwrap_or_default().to_string());
            drop(self.receiver.lock().unwrap().take());
            Ok(ToolResult::success("created", ToolData::Empty))
        }
    }

    fn invocation(index: u32, name: &str, arguments: &str) -> ToolInvocation {
        ToolInvocation {
            stream_index: index,
            id: format!("c{index}"),
            function_name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_closed_receiver_dispatches_nothing() {
        let (router, seen) = router_with("get_case_details");
        let transport = Arc::new(MockCompletionTransport::new());
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, rx) = mpsc::channel(32);
        drop(rx);

        let calls = vec![invocation(0, "get_case_details", "{}")];
        let resolved = orch.resolve_tools(&calls, &CancellationToken::new(), &tx).await;
        assert!(resolved.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_keeps_in_flight_call_and_skips_the_rest() {
        let (tx, rx) = mpsc::channel(32);
        let calls_seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = ToolRouter::new();
        router
            .register_external(Arc::new(Disconnecting {
                calls: calls_seen.clone(),
                receiver: Mutex::new(Some(rx)),
            }))
            .unwrap();
        let transport = Arc::new(MockCompletionTransport::with_script(
            MockScript::new()
                .then_tool_call(0, "c0", "create_legal_case", &["{\"title\":\"first\"}"])
                .then_tool_call(1, "c1", "create_legal_case", &["{\"title\":\"second\"}"]),
        ));
        let mut orch = StreamOrchestrator::new(transport, Arc::new(router));

        let outcome = orch.run(CompletionRequest::default(), &CancellationToken::new(), &tx).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.resolved.len(), 1);
        assert!(outcome.resolved[0].result.is_success());
        assert_eq!(calls_seen.lock().unwrap().as_slice(), &["first".to_string()]);
        assert_eq!(orch.state(), OrchestratorState::Done);
    }

    #[tokio::test]
    async fn test_cancel_while_streaming() {
        let transport = Arc::new(
            MockCompletionTransport::with_script(
                MockScript::text("a").then_text("b").then_text("c").then_text("d"),
            )
            .with_delay(Duration::from_millis(50)),
        );
        let (router, _) = router_with("noop");
        let mut orch = StreamOrchestrator::new(transport, router);
        let (tx, _rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(70)).await;
            trigger.cancel();
        });

        let outcome = orch.run(CompletionRequest::default(), &cancel, &tx).await;
        assert!(outcome.cancelled);
        assert!(outcome.text.len() < 4);
        assert_eq!(orch.state(), OrchestratorState::Done);
    }
}
