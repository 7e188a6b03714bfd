//! Registration of the built-in handlers and local-over-external resolution.

use counsel_core::config::ActionsConfig;
use counsel_core::records::{FailureKind, ToolData, ToolResult};
use counsel_core::router::{HandlerSource, ToolRouter};
use counsel_tools::{LegalStore, register_builtin_handlers};
use serde_json::json;
use tempfile::TempDir;

fn actions_config(dir: &TempDir) -> ActionsConfig {
    ActionsConfig {
        database_path: Some(dir.path().join("legal.db")),
        // Nothing listens here; external calls fail fast.
        legal_api_base_url: "http://127.0.0.1:9".to_string(),
        handler_timeout_secs: 5,
        ..ActionsConfig::default()
    }
}

#[test]
fn test_without_store_everything_is_external() {
    let dir = TempDir::new().unwrap();
    let mut router = ToolRouter::new();
    let store = register_builtin_handlers(&mut router, &actions_config(&dir)).unwrap();

    assert!(store.is_none());
    assert!(!dir.path().join("legal.db").exists());
    let (source, _) = router.resolve("search_cases").unwrap();
    assert_eq!(source, HandlerSource::External);
    assert_eq!(router.len(), 14);
}

#[test]
fn test_existing_store_shadows_the_api() {
    let dir = TempDir::new().unwrap();
    let config = actions_config(&dir);
    LegalStore::open(config.resolved_database_path())
        .unwrap()
        .seed()
        .unwrap();

    let mut router = ToolRouter::new();
    let store = register_builtin_handlers(&mut router, &config).unwrap();
    assert!(store.is_some());

    for name in ["search_cases", "get_case_details", "get_invoice", "get_legal_rates"] {
        assert_eq!(router.resolve(name).unwrap().0, HandlerSource::Local, "{name}");
    }
    for name in ["calculate_legal_estimate", "get_client_invoices", "generate_invoice"] {
        assert_eq!(router.resolve(name).unwrap().0, HandlerSource::External, "{name}");
    }
    // One definition per name even when both tiers serve it.
    assert_eq!(router.definitions().len(), 14);
}

#[tokio::test]
async fn test_dispatch_reaches_local_store() {
    let dir = TempDir::new().unwrap();
    let config = actions_config(&dir);
    LegalStore::open(config.resolved_database_path())
        .unwrap()
        .seed()
        .unwrap();
    let mut router = ToolRouter::new();
    register_builtin_handlers(&mut router, &config).unwrap();

    let result = router
        .dispatch("get_invoice", json!({"invoice_id": "INV-2026-003"}))
        .await;
    let ToolResult::Success { message, data: ToolData::Invoice(invoice) } = result else {
        panic!("expected invoice, got {result:?}");
    };
    assert_eq!(message, "Invoice INV-2026-003");
    assert_eq!(invoice.client_name, "TechStart Industries");
}

#[tokio::test]
async fn test_missing_argument_surfaces_as_failed_action() {
    let dir = TempDir::new().unwrap();
    let mut router = ToolRouter::new();
    register_builtin_handlers(&mut router, &actions_config(&dir)).unwrap();

    let result = router.dispatch("generate_invoice", json!({"items": []})).await;
    let ToolResult::Failure { kind, reason } = result else {
        panic!("expected failure");
    };
    assert_eq!(kind, FailureKind::Execution);
    assert!(reason.contains("client_name"));
}

#[tokio::test]
async fn test_unreachable_api_is_a_failed_action() {
    let dir = TempDir::new().unwrap();
    let mut router = ToolRouter::new();
    register_builtin_handlers(&mut router, &actions_config(&dir)).unwrap();

    let result = router
        .dispatch("calculate_legal_estimate", json!({"service": "Consultation", "hours": 1}))
        .await;
    assert!(!result.is_success());
    assert!(result.error_reason().unwrap().contains("Legal API request failed"));
}
