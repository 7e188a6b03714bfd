//! Tool Router: resolves a function name to a handler and normalizes results.
//!
//! Handlers live in two tiers. A local data-store handler registered under a
//! name always wins; otherwise the external-API handler of that name is used.
//! Whatever happens inside a handler, `dispatch` returns a [`ToolResult`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::records::ToolResult;
use crate::types::ToolDefinition;

/// Appended to failures raised after a handler started running.
pub const PARTIAL_EFFECTS_NOTE: &str = "the action may have been partially applied";

/// Trait that all action handlers implement.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The function name the model calls.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the action. `args` is always a JSON object.
    async fn call(&self, args: Value) -> Result<ToolResult, ToolError>;

    /// Maximum execution time before the router reports a timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}

/// Which tier resolved a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSource {
    Local,
    External,
}

impl fmt::Display for HandlerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSource::Local => write!(f, "local"),
            HandlerSource::External => write!(f, "external"),
        }
    }
}

#[derive(Default)]
pub struct ToolRouter {
    local: HashMap<String, Arc<dyn ActionHandler>>,
    external: HashMap<String, Arc<dyn ActionHandler>>,
    timeout_override: Option<Duration>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one timeout to every handler instead of each handler's own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    /// Register a local data-store handler.
    pub fn register_local(&mut self, handler: Arc<dyn ActionHandler>) -> Result<(), ToolError> {
        Self::insert(&mut self.local, handler, HandlerSource::Local)
    }

    /// Register an external-API handler.
    pub fn register_external(&mut self, handler: Arc<dyn ActionHandler>) -> Result<(), ToolError> {
        Self::insert(&mut self.external, handler, HandlerSource::External)
    }

    fn insert(
        tier: &mut HashMap<String, Arc<dyn ActionHandler>>,
        handler: Arc<dyn ActionHandler>,
        source: HandlerSource,
    ) -> Result<(), ToolError> {
        let name = handler.name().to_string();
        if tier.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered { name });
        }
        debug!(tool = %name, %source, "Registering handler");
        tier.insert(name, handler);
        Ok(())
    }

    /// Resolve a name, local tier first.
    pub fn resolve(&self, name: &str) -> Option<(HandlerSource, Arc<dyn ActionHandler>)> {
        self.local
            .get(name)
            .map(|h| (HandlerSource::Local, h.clone()))
            .or_else(|| {
                self.external
                    .get(name)
                    .map(|h| (HandlerSource::External, h.clone()))
            })
    }

    /// Definitions offered to the model, one per name, sorted by name. The
    /// local handler's schema is used when both tiers define a name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut by_name: BTreeMap<&str, &Arc<dyn ActionHandler>> = BTreeMap::new();
        for (name, handler) in &self.external {
            by_name.insert(name, handler);
        }
        for (name, handler) in &self.local {
            by_name.insert(name, handler);
        }
        by_name
            .into_values()
            .map(|h| ToolDefinition {
                name: h.name().to_string(),
                description: h.description().to_string(),
                parameters: h.parameters_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.external.is_empty()
    }

    /// Dispatch one invocation and normalize the outcome.
    ///
    /// The handler runs on its own task, so dropping this future (client
    /// disconnect) does not abort a side effect already in flight. Errors,
    /// timeouts, and panics all come back as a failed `ToolResult`.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        if !args.is_object() {
            return ToolResult::invalid_arguments(format!(
                "arguments for '{name}' must be a JSON object"
            ));
        }
        let Some((source, handler)) = self.resolve(name) else {
            warn!(tool = %name, "No handler registered");
            return ToolResult::unknown_function();
        };

        let timeout = self.timeout_override.unwrap_or_else(|| handler.timeout());
        info!(tool = %name, %source, timeout_secs = timeout.as_secs(), "Dispatching tool call");

        let task_name = name.to_string();
        let task = tokio::spawn(async move {
            match tokio::time::timeout(timeout, handler.call(args)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    name: task_name,
                    timeout_secs: timeout.as_secs(),
                }),
            }
        });

        let outcome = match task.await {
            Ok(result) => result,
            Err(join_error) => Err(ToolError::Panicked {
                name: name.to_string(),
                message: join_error.to_string(),
            }),
        };

        match outcome {
            Ok(result) => {
                if let Some(reason) = result.error_reason() {
                    warn!(tool = %name, %reason, "Handler reported failure");
                }
                result
            }
            Err(err) => {
                warn!(tool = %name, error = %err, "Handler errored");
                let reason = match &err {
                    ToolError::ExecutionFailed { .. } | ToolError::Panicked { .. } => {
                        format!("{err}; {PARTIAL_EFFECTS_NOTE}")
                    }
                    _ => err.to_string(),
                };
                ToolResult::failure(reason)
            }
        }
    }
}
