//! # Counsel Tools
//!
//! Action handlers the completion model can call, in two tiers:
//!
//! - **Local**: answered from a SQLite [`LegalStore`] when one exists.
//! - **External**: the legal-practice REST API, a generic HTTP call,
//!   notifications, and invoice generation.
//!
//! [`register_builtin_handlers`] wires both tiers into a
//! [`ToolRouter`](counsel_core::ToolRouter).

pub mod args;
pub mod http;
pub mod invoice;
pub mod legal_api;
pub mod local;
pub mod notify;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_server;

use counsel_core::config::ActionsConfig;
use counsel_core::error::ToolError;
use counsel_core::router::ToolRouter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use http::ExternalApiHandler;
pub use invoice::GenerateInvoiceHandler;
pub use legal_api::{LegalAction, LegalApiClient, LegalApiHandler};
pub use local::{LocalAction, StoreHandler};
pub use notify::{EmailNotificationHandler, TeamsNotificationHandler};
pub use store::{LegalStore, StoreError};

/// Register every built-in handler.
///
/// External handlers are always registered. Local handlers are registered
/// only when the configured database file already exists (see
/// `counsel db init`), so an empty store never shadows the legal API.
/// Returns the opened store, if any.
pub fn register_builtin_handlers(
    router: &mut ToolRouter,
    config: &ActionsConfig,
) -> Result<Option<LegalStore>, ToolError> {
    let timeout = Duration::from_secs(config.handler_timeout_secs);

    let client = Arc::new(LegalApiClient::new(&config.legal_api_base_url, timeout)?);
    for handler in LegalApiHandler::all(client) {
        router.register_external(handler)?;
    }
    router.register_external(Arc::new(ExternalApiHandler::new(timeout)?))?;
    router.register_external(Arc::new(EmailNotificationHandler))?;
    router.register_external(Arc::new(TeamsNotificationHandler::new(timeout)?))?;
    router.register_external(Arc::new(GenerateInvoiceHandler))?;

    let path = config.resolved_database_path();
    if !path.exists() {
        info!(path = %path.display(), "No local store; legal functions use the API");
        return Ok(None);
    }
    let store = match LegalStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Local store unavailable; using the API");
            return Ok(None);
        }
    };
    for handler in StoreHandler::all(&store) {
        router.register_local(handler)?;
    }
    info!(
        path = %path.display(),
        local = LocalAction::ALL.len(),
        base_url = %config.legal_api_base_url,
        "Registered built-in handlers"
    );
    Ok(Some(store))
}
