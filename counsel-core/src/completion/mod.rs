//! Streaming completion transports.
//!
//! A [`CompletionTransport`] pushes [`CompletionDelta`]s into a channel as
//! they arrive and returns once the stream has ended. The orchestrator owns
//! the receiving side.

pub mod openai;

pub use openai::OpenAiCompatTransport;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::CompletionError;
use crate::types::{CompletionDelta, CompletionRequest};

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Stream one chat completion, sending deltas to `tx`.
    ///
    /// Text deltas and index-keyed tool-call deltas are forwarded exactly as
    /// received. `CompletionDelta::Done` is sent when the stream ends cleanly.
    async fn stream_chat(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<CompletionDelta>,
    ) -> Result<(), CompletionError>;

    fn model_name(&self) -> &str;
}

/// One scripted response of a [`MockCompletionTransport`].
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    deltas: Vec<CompletionDelta>,
    failure: Option<String>,
}

impl MockScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response made of a single text delta.
    pub fn text(text: &str) -> Self {
        Self::new().then_text(text)
    }

    /// Append one text delta.
    pub fn then_text(mut self, text: &str) -> Self {
        self.deltas.push(CompletionDelta::Text(text.to_string()));
        self
    }

    /// Append a tool call split into argument fragments. The first fragment
    /// carries the id and name; the rest carry only arguments.
    pub fn then_tool_call(mut self, index: u32, id: &str, name: &str, fragments: &[&str]) -> Self {
        if fragments.is_empty() {
            self.deltas.push(CompletionDelta::ToolCall {
                index,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: String::new(),
            });
        }
        for (i, fragment) in fragments.iter().enumerate() {
            let first = i == 0;
            self.deltas.push(CompletionDelta::ToolCall {
                index,
                id: first.then(|| id.to_string()),
                name: first.then(|| name.to_string()),
                arguments: fragment.to_string(),
            });
        }
        self
    }

    /// Append a raw delta.
    pub fn then_delta(mut self, delta: CompletionDelta) -> Self {
        self.deltas.push(delta);
        self
    }

    /// End the stream with a transport error instead of `Done`.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

/// A mock transport for testing: replays queued scripts in order.
pub struct MockCompletionTransport {
    scripts: Mutex<VecDeque<MockScript>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockCompletionTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_script(script: MockScript) -> Self {
        let transport = Self::new();
        transport.queue(script);
        transport
    }

    /// Sleep between deltas, for cancellation tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue(&self, script: MockScript) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockCompletionTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionTransport for MockCompletionTransport {
    async fn stream_chat(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<CompletionDelta>,
    ) -> Result<(), CompletionError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| MockScript::text("Mock response"));

        for delta in script.deltas {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if tx.send(delta).await.is_err() {
                return Err(CompletionError::Cancelled);
            }
        }

        match script.failure {
            Some(message) => Err(CompletionError::Streaming { message }),
            None => {
                let _ = tx.send(CompletionDelta::Done).await;
                Ok(())
            }
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
