//! Local-first handlers answered from the SQLite [`LegalStore`].
//!
//! Registered in the router's local tier, so they shadow the legal API
//! handlers of the same name whenever a store is configured.

use async_trait::async_trait;
use counsel_core::error::ToolError;
use counsel_core::records::{ToolData, ToolResult};
use counsel_core::router::ActionHandler;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::args::{opt_bool, opt_f64, opt_str, required_str};
use crate::schema;
use crate::store::{CaseFilter, CaseUpdate, LegalStore, NewCase, StoreError};

/// The functions the local store can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    SearchCases,
    GetCaseDetails,
    CreateLegalCase,
    UpdateCaseStatus,
    GetAttorneyInfo,
    SearchInvoices,
    GetInvoice,
    GetLegalRates,
}

impl LocalAction {
    pub const ALL: [LocalAction; 8] = [
        LocalAction::SearchCases,
        LocalAction::GetCaseDetails,
        LocalAction::CreateLegalCase,
        LocalAction::UpdateCaseStatus,
        LocalAction::GetAttorneyInfo,
        LocalAction::SearchInvoices,
        LocalAction::GetInvoice,
        LocalAction::GetLegalRates,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LocalAction::SearchCases => schema::SEARCH_CASES,
            LocalAction::GetCaseDetails => schema::GET_CASE_DETAILS,
            LocalAction::CreateLegalCase => schema::CREATE_LEGAL_CASE,
            LocalAction::UpdateCaseStatus => schema::UPDATE_CASE_STATUS,
            LocalAction::GetAttorneyInfo => schema::GET_ATTORNEY_INFO,
            LocalAction::SearchInvoices => schema::SEARCH_INVOICES,
            LocalAction::GetInvoice => schema::GET_INVOICE,
            LocalAction::GetLegalRates => schema::GET_LEGAL_RATES,
        }
    }

    /// Run against the store. Blocking; call from the blocking pool.
    fn run(self, store: &LegalStore, args: &Value) -> Result<ToolResult, ToolError> {
        let name = self.name();
        let outcome = match self {
            LocalAction::SearchCases => {
                let filter = CaseFilter {
                    status: opt_str(args, "status").map(String::from),
                    case_type: opt_str(args, "case_type").map(String::from),
                    attorney_id: opt_str(args, "attorney_id").map(String::from),
                };
                store.search_cases(&filter).map(|cases| {
                    ToolResult::success(
                        format!("Found {} case(s)", cases.len()),
                        ToolData::CaseList(cases),
                    )
                })
            }
            LocalAction::GetCaseDetails => {
                let key = case_key(name, args)?;
                store.case(key).map(|found| match found {
                    Some(case) => ToolResult::success(
                        format!("Case {}: {}", case.case_number, case.title),
                        ToolData::Case(case),
                    ),
                    None => ToolResult::failure(format!("Case {key} not found")),
                })
            }
            LocalAction::CreateLegalCase => {
                let new = NewCase {
                    title: required_str(name, args, "title")?.to_string(),
                    case_type: opt_str(args, "case_type")
                        .or_else(|| opt_str(args, "type"))
                        .ok_or_else(|| ToolError::InvalidArguments {
                            name: name.to_string(),
                            reason: "missing required 'case_type' parameter".to_string(),
                        })?
                        .to_string(),
                    client: required_str(name, args, "client")?.to_string(),
                    attorney_id: required_str(name, args, "attorney_id")?.to_string(),
                    estimated_value: opt_f64(args, "estimated_value"),
                };
                store.create_case(&new).map(|case| {
                    ToolResult::success(
                        format!("Case created successfully: {}", case.case_number),
                        ToolData::Case(case),
                    )
                })
            }
            LocalAction::UpdateCaseStatus => {
                let key = case_key(name, args)?;
                let update = CaseUpdate {
                    status: opt_str(args, "status").map(String::from),
                    next_hearing: opt_str(args, "next_hearing").map(String::from),
                    estimated_value: opt_f64(args, "estimated_value"),
                };
                if update.is_empty() {
                    return Ok(ToolResult::failure("No updates provided"));
                }
                store.update_case(key, &update).map(|found| match found {
                    Some(case) => {
                        let message = match &update.status {
                            Some(status) => {
                                format!("Case {} status updated to {status}", case.case_number)
                            }
                            None => format!("Case {} updated successfully", case.case_number),
                        };
                        ToolResult::success(message, ToolData::Case(case))
                    }
                    None => ToolResult::failure(format!("Case {key} not found")),
                })
            }
            LocalAction::GetAttorneyInfo => match opt_str(args, "attorney_id") {
                Some(id) => store.attorney(id).map(|found| match found {
                    Some(attorney) => ToolResult::success(
                        format!("Attorney {}", attorney.name),
                        ToolData::Attorney(attorney),
                    ),
                    None => ToolResult::failure(format!("Attorney {id} not found")),
                }),
                None => store
                    .attorneys(
                        opt_str(args, "specialty"),
                        opt_bool(args, "available_only").unwrap_or(false),
                    )
                    .map(|list| {
                        ToolResult::success(
                            format!("Found {} attorney(s)", list.len()),
                            ToolData::AttorneyList(list),
                        )
                    }),
            },
            LocalAction::SearchInvoices => {
                let query = required_str(name, args, "query")?;
                store.search_invoices(query).map(|invoices| {
                    ToolResult::success(
                        format!("Found {} invoice(s)", invoices.len()),
                        ToolData::InvoiceList(invoices),
                    )
                })
            }
            LocalAction::GetInvoice => {
                let key = opt_str(args, "invoice_number")
                    .map(Ok)
                    .unwrap_or_else(|| required_str(name, args, "invoice_id"))?;
                store.invoice(key).map(|found| match found {
                    Some(invoice) => ToolResult::success(
                        format!("Invoice {}", invoice.invoice_number),
                        ToolData::Invoice(invoice),
                    ),
                    None => ToolResult::failure(format!("Invoice {key} not found")),
                })
            }
            LocalAction::GetLegalRates => {
                store
                    .rates(opt_str(args, "service_type"))
                    .map(|rates| {
                        ToolResult::success(
                            format!("Found {} rate(s)", rates.len()),
                            ToolData::Rates(rates),
                        )
                    })
            }
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(StoreError::NotFound(message)) => Ok(ToolResult::failure(message)),
            Err(e) => Err(ToolError::ExecutionFailed {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Case lookups accept either `case_id` or `case_number`.
fn case_key<'a>(name: &str, args: &'a Value) -> Result<&'a str, ToolError> {
    opt_str(args, "case_number")
        .map(Ok)
        .unwrap_or_else(|| required_str(name, args, "case_id"))
}

/// One local function bound to the store.
pub struct StoreHandler {
    action: LocalAction,
    store: LegalStore,
}

impl StoreHandler {
    pub fn new(action: LocalAction, store: LegalStore) -> Self {
        Self { action, store }
    }

    /// A handler for every [`LocalAction`].
    pub fn all(store: &LegalStore) -> Vec<Arc<dyn ActionHandler>> {
        LocalAction::ALL
            .into_iter()
            .map(|action| Arc::new(Self::new(action, store.clone())) as Arc<dyn ActionHandler>)
            .collect()
    }
}

#[async_trait]
impl ActionHandler for StoreHandler {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn description(&self) -> &str {
        schema::description(self.action.name())
    }

    fn parameters_schema(&self) -> Value {
        schema::parameters(self.action.name())
    }

    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        let action = self.action;
        let store = self.store.clone();
        debug!(tool = action.name(), "Querying local store");
        tokio::task::spawn_blocking(move || action.run(&store, &args))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: action.name().to_string(),
                message: format!("Task join error: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_core::records::FailureKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn handler(action: LocalAction) -> (TempDir, StoreHandler) {
        let dir = TempDir::new().unwrap();
        let store = LegalStore::open(dir.path().join("legal.db")).unwrap();
        store.seed().unwrap();
        (dir, StoreHandler::new(action, store))
    }

    #[tokio::test]
    async fn test_search_cases_message_and_family() {
        let (_dir, h) = handler(LocalAction::SearchCases);
        let result = h.call(json!({"status": "Active"})).await.unwrap();
        let ToolResult::Success { message, data } = result else {
            panic!("expected success");
        };
        assert_eq!(message, "Found 3 case(s)");
        assert!(matches!(data, ToolData::CaseList(ref c) if c.len() == 3));
    }

    #[tokio::test]
    async fn test_case_details_accepts_number_and_reports_missing() {
        let (_dir, h) = handler(LocalAction::GetCaseDetails);
        let ok = h.call(json!({"case_id": "2025-CV-10002"})).await.unwrap();
        assert!(matches!(
            ok,
            ToolResult::Success { data: ToolData::Case(ref c), .. } if c.attorney.is_some()
        ));

        let missing = h.call(json!({"case_number": "2030-CV-00001"})).await.unwrap();
        assert_eq!(missing.error_reason(), Some("Case 2030-CV-00001 not found"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_an_error() {
        let (_dir, h) = handler(LocalAction::GetCaseDetails);
        let err = h.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_create_case_message() {
        let (_dir, h) = handler(LocalAction::CreateLegalCase);
        let result = h
            .call(json!({
                "title": "Doe v. Roe",
                "case_type": "Employment Law",
                "client": "Jane Doe",
                "attorney_id": "att-003",
                "estimated_value": "90000"
            }))
            .await
            .unwrap();
        let ToolResult::Success { message, data: ToolData::Case(case) } = result else {
            panic!("expected case");
        };
        assert_eq!(message, format!("Case created successfully: {}", case.case_number));
        assert_eq!(case.estimated_value, Some(90_000.0));
    }

    #[tokio::test]
    async fn test_create_case_unknown_attorney_is_a_failure_result() {
        let (_dir, h) = handler(LocalAction::CreateLegalCase);
        let result = h
            .call(json!({"title": "T", "case_type": "X", "client": "C", "attorney_id": "att-404"}))
            .await
            .unwrap();
        assert_eq!(result.error_reason(), Some("Attorney att-404 not found"));
    }

    #[tokio::test]
    async fn test_update_case_status() {
        let (_dir, h) = handler(LocalAction::UpdateCaseStatus);
        let result = h
            .call(json!({"case_id": "2025-CV-10001", "status": "Settled"}))
            .await
            .unwrap();
        let ToolResult::Success { message, .. } = result else {
            panic!("expected success");
        };
        assert_eq!(message, "Case 2025-CV-10001 status updated to Settled");

        let empty = h.call(json!({"case_id": "2025-CV-10001"})).await.unwrap();
        assert_eq!(empty.error_reason(), Some("No updates provided"));
        assert!(matches!(empty, ToolResult::Failure { kind: FailureKind::Execution, .. }));
    }

    #[tokio::test]
    async fn test_attorney_by_id_or_list() {
        let (_dir, h) = handler(LocalAction::GetAttorneyInfo);
        let one = h.call(json!({"attorney_id": "att-001"})).await.unwrap();
        assert!(matches!(one, ToolResult::Success { data: ToolData::Attorney(_), .. }));

        let list = h.call(json!({"available_only": true})).await.unwrap();
        assert!(matches!(
            list,
            ToolResult::Success { data: ToolData::AttorneyList(ref a), .. } if a.len() == 4
        ));

        let missing = h.call(json!({"attorney_id": "att-999"})).await.unwrap();
        assert_eq!(missing.error_reason(), Some("Attorney att-999 not found"));
    }

    #[tokio::test]
    async fn test_invoice_lookup_and_search() {
        let (_dir, h) = handler(LocalAction::GetInvoice);
        let result = h.call(json!({"invoice_id": "INV-2026-002"})).await.unwrap();
        let ToolResult::Success { data: ToolData::Invoice(invoice), .. } = result else {
            panic!("expected invoice");
        };
        assert_eq!(invoice.items.len(), 3);
        assert_eq!(invoice.subtotal, Some(13_600.0));

        let (_dir2, search) = handler(LocalAction::SearchInvoices);
        let found = search.call(json!({"query": "INV-2026"})).await.unwrap();
        assert!(matches!(
            found,
            ToolResult::Success { data: ToolData::InvoiceList(ref l), .. } if l.len() == 3
        ));
    }

    #[tokio::test]
    async fn test_rates_are_offered_under_the_shared_schema() {
        let (_dir, h) = handler(LocalAction::GetLegalRates);
        assert_eq!(h.name(), "get_legal_rates");
        assert_eq!(h.parameters_schema(), schema::parameters("get_legal_rates"));
        let result = h.call(json!({})).await.unwrap();
        assert!(matches!(
            result,
            ToolResult::Success { data: ToolData::Rates(ref r), .. } if r[0].rate == 600.0
        ));
    }
}
