//! Legal-practice REST API handlers.
//!
//! These serve the external tier: a function the local store also answers
//! only reaches the API when no store is configured. Non-2xx responses and
//! transport failures become [`ToolError::ExecutionFailed`], which the router
//! reports as a failed action.

use async_trait::async_trait;
use counsel_core::error::ToolError;
use counsel_core::records::{
    AttorneyRecord, CaseRecord, ClientInvoices, Estimate, InvoiceRecord, LegalRate, ToolData,
    ToolResult,
};
use counsel_core::render::money;
use counsel_core::router::ActionHandler;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::args::{opt_bool, opt_f64, opt_str, required_f64, required_str};
use crate::schema;

/// Functions served by the legal-practice API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegalAction {
    CreateLegalCase,
    UpdateCaseStatus,
    SearchCases,
    GetCaseDetails,
    GetAttorneyInfo,
    GetLegalRates,
    CalculateLegalEstimate,
    SearchInvoices,
    GetInvoice,
    GetClientInvoices,
}

impl LegalAction {
    pub const ALL: [LegalAction; 10] = [
        LegalAction::CreateLegalCase,
        LegalAction::UpdateCaseStatus,
        LegalAction::SearchCases,
        LegalAction::GetCaseDetails,
        LegalAction::GetAttorneyInfo,
        LegalAction::GetLegalRates,
        LegalAction::CalculateLegalEstimate,
        LegalAction::SearchInvoices,
        LegalAction::GetInvoice,
        LegalAction::GetClientInvoices,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LegalAction::CreateLegalCase => schema::CREATE_LEGAL_CASE,
            LegalAction::UpdateCaseStatus => schema::UPDATE_CASE_STATUS,
            LegalAction::SearchCases => schema::SEARCH_CASES,
            LegalAction::GetCaseDetails => schema::GET_CASE_DETAILS,
            LegalAction::GetAttorneyInfo => schema::GET_ATTORNEY_INFO,
            LegalAction::GetLegalRates => schema::GET_LEGAL_RATES,
            LegalAction::CalculateLegalEstimate => schema::CALCULATE_LEGAL_ESTIMATE,
            LegalAction::SearchInvoices => schema::SEARCH_INVOICES,
            LegalAction::GetInvoice => schema::GET_INVOICE,
            LegalAction::GetClientInvoices => schema::GET_CLIENT_INVOICES,
        }
    }
}

/// Thin JSON client for the legal-practice API.
#[derive(Debug, Clone)]
pub struct LegalApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl LegalApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                name: "legal_api".into(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        tool: &str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ToolError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(tool, %method, %url, "Calling legal API");

        let mut builder = self.http.request(method, &url).query(query);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let failed = |message: String| ToolError::ExecutionFailed {
            name: tool.to_string(),
            message,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| failed(format!("Legal API request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| failed(format!("Failed to read legal API response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            warn!(tool, status = status.as_u16(), %detail, "Legal API returned an error");
            return Err(failed(format!(
                "Legal API returned HTTP {}: {detail}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| failed(format!("Legal API response was not JSON: {e}")))
    }
}

fn decode<T: DeserializeOwned>(tool: &str, value: Value) -> Result<T, ToolError> {
    serde_json::from_value(value).map_err(|e| ToolError::ExecutionFailed {
        name: tool.to_string(),
        message: format!("Unexpected legal API payload: {e}"),
    })
}

/// Pull `key` out of a response envelope such as `{"count": 2, "cases": [...]}`.
fn field(body: &mut Value, key: &str) -> Value {
    body.get_mut(key).map(Value::take).unwrap_or(Value::Null)
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Query pairs for whichever of `keys` the model supplied.
fn filters(args: &Value, keys: &[&'static str]) -> Vec<(&'static str, String)> {
    keys.iter()
        .filter_map(|&key| opt_str(args, key).map(|v| (key, v.to_string())))
        .collect()
}

/// One legal API function.
pub struct LegalApiHandler {
    action: LegalAction,
    client: Arc<LegalApiClient>,
}

impl LegalApiHandler {
    pub fn new(action: LegalAction, client: Arc<LegalApiClient>) -> Self {
        Self { action, client }
    }

    /// A handler for every [`LegalAction`], sharing one client.
    pub fn all(client: Arc<LegalApiClient>) -> Vec<Arc<dyn ActionHandler>> {
        LegalAction::ALL
            .into_iter()
            .map(|action| Arc::new(Self::new(action, client.clone())) as Arc<dyn ActionHandler>)
            .collect()
    }
}

#[async_trait]
impl ActionHandler for LegalApiHandler {
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
        let name = self.action.name();
        let api = &self.client;

        match self.action {
            LegalAction::CreateLegalCase => {
                let mut body = json!({
                    "title": required_str(name, &args, "title")?,
                    "type": opt_str(&args, "case_type")
                        .or_else(|| opt_str(&args, "type"))
                        .ok_or_else(|| ToolError::InvalidArguments {
                            name: name.to_string(),
                            reason: "missing required 'case_type' parameter".to_string(),
                        })?,
                    "client": required_str(name, &args, "client")?,
                    "attorney_id": required_str(name, &args, "attorney_id")?,
                });
                if let Some(value) = opt_f64(&args, "estimated_value") {
                    body["estimated_value"] = json!(value);
                }
                let mut response = api.request(name, Method::POST, "cases", &[], Some(body)).await?;
                let case: CaseRecord = decode(name, field(&mut response, "case"))?;
                Ok(ToolResult::success(
                    format!("Case created successfully: {}", case.case_number),
                    ToolData::Case(case),
                ))
            }
            LegalAction::UpdateCaseStatus => {
                let case_id = required_str(name, &args, "case_id")?;
                let mut updates = Map::new();
                if let Some(status) = opt_str(&args, "status") {
                    updates.insert("status".into(), json!(status));
                }
                if let Some(hearing) = opt_str(&args, "next_hearing") {
                    updates.insert("next_hearing".into(), json!(hearing));
                }
                if let Some(value) = opt_f64(&args, "estimated_value") {
                    updates.insert("estimated_value".into(), json!(value));
                }
                if updates.is_empty() {
                    return Ok(ToolResult::failure("No updates provided"));
                }
                let path = format!("cases/{}", segment(case_id));
                let mut response = api
                    .request(name, Method::PUT, &path, &[], Some(Value::Object(updates)))
                    .await?;
                let case: CaseRecord = decode(name, field(&mut response, "case"))?;
                Ok(ToolResult::success(
                    "Case updated successfully",
                    ToolData::Case(case),
                ))
            }
            LegalAction::SearchCases => {
                let query = filters(&args, &["status", "case_type", "attorney_id"]);
                let mut response = api.request(name, Method::GET, "cases", &query, None).await?;
                let cases: Vec<CaseRecord> = decode(name, field(&mut response, "cases"))?;
                Ok(ToolResult::success(
                    format!("Found {} cases", cases.len()),
                    ToolData::CaseList(cases),
                ))
            }
            LegalAction::GetCaseDetails => {
                let case_id = required_str(name, &args, "case_id")?;
                let path = format!("cases/{}", segment(case_id));
                let response = api.request(name, Method::GET, &path, &[], None).await?;
                let case: CaseRecord = decode(name, response)?;
                Ok(ToolResult::success(
                    format!("Case {}: {}", case.case_number, case.title),
                    ToolData::Case(case),
                ))
            }
            LegalAction::GetAttorneyInfo => {
                if let Some(id) = opt_str(&args, "attorney_id") {
                    let path = format!("attorneys/{}", segment(id));
                    let response = api.request(name, Method::GET, &path, &[], None).await?;
                    let attorney: AttorneyRecord = decode(name, response)?;
                    return Ok(ToolResult::success(
                        format!("Attorney {}", attorney.name),
                        ToolData::Attorney(attorney),
                    ));
                }
                let mut query = filters(&args, &["specialty"]);
                if opt_bool(&args, "available_only").unwrap_or(false) {
                    query.push(("available_only", "true".to_string()));
                }
                let mut response = api.request(name, Method::GET, "attorneys", &query, None).await?;
                let list: Vec<AttorneyRecord> = decode(name, field(&mut response, "attorneys"))?;
                Ok(ToolResult::success(
                    format!("Found {} attorney(s)", list.len()),
                    ToolData::AttorneyList(list),
                ))
            }
            LegalAction::GetLegalRates => {
                let query = filters(&args, &["service_type"]);
                let mut response = api
                    .request(name, Method::GET, "legal-rates", &query, None)
                    .await?;
                let rates: Vec<LegalRate> = decode(name, field(&mut response, "rates"))?;
                Ok(ToolResult::success(
                    format!("Found {} rate(s)", rates.len()),
                    ToolData::Rates(rates),
                ))
            }
            LegalAction::CalculateLegalEstimate => {
                let service = required_str(name, &args, "service")?;
                let hours = required_f64(name, &args, "hours")?;
                let query = [("service", service.to_string()), ("hours", hours.to_string())];
                let response = api
                    .request(name, Method::GET, "calculate-estimate", &query, None)
                    .await?;
                let estimate: Estimate = decode(name, response)?;
                Ok(ToolResult::success(
                    format!("Total estimate: {}", money(estimate.total)),
                    ToolData::Estimate(estimate),
                ))
            }
            LegalAction::SearchInvoices => {
                let query = required_str(name, &args, "query")?;
                let path = format!("invoices/search/{}", segment(query));
                let mut response = api.request(name, Method::GET, &path, &[], None).await?;
                let invoices: Vec<InvoiceRecord> =
                    decode(name, field(&mut response, "invoices"))?;
                Ok(ToolResult::success(
                    format!("Found {} invoice(s)", invoices.len()),
                    ToolData::InvoiceList(invoices),
                ))
            }
            LegalAction::GetInvoice => {
                let id = opt_str(&args, "invoice_number")
                    .map(Ok)
                    .unwrap_or_else(|| required_str(name, &args, "invoice_id"))?;
                let path = format!("invoices/{}", segment(id));
                let response = api.request(name, Method::GET, &path, &[], None).await?;
                let invoice: InvoiceRecord = decode(name, response)?;
                Ok(ToolResult::success(
                    format!("Invoice {}", invoice.invoice_number),
                    ToolData::Invoice(invoice),
                ))
            }
            LegalAction::GetClientInvoices => {
                let client = required_str(name, &args, "client_name")?;
                let path = format!("invoices/client/{}", segment(client));
                let response = api.request(name, Method::GET, &path, &[], None).await?;
                let summary: ClientInvoices = decode(name, response)?;
                Ok(ToolResult::success(
                    format!(
                        "{} invoice(s) for {}",
                        summary.invoice_count, summary.client_name
                    ),
                    ToolData::ClientInvoices(summary),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, TestServer};
    use pretty_assertions::assert_eq;

    fn handler(server: &TestServer, action: LegalAction) -> LegalApiHandler {
        let client = LegalApiClient::new(server.url(), Duration::from_secs(5)).unwrap();
        LegalApiHandler::new(action, Arc::new(client))
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = LegalApiClient::new("http://localhost:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001");
    }

    #[test]
    fn test_filters_keep_only_requested_keys() {
        let args = json!({"status": "Active", "specialty": "IP", "case_type": ""});
        let query = filters(&args, &["status", "case_type"]);
        assert_eq!(query, vec![("status", "Active".to_string())]);
    }

    #[tokio::test]
    async fn test_search_cases_reads_envelope() {
        let server = TestServer::start(vec![Reply::json(
            200,
            json!({"count": 1, "cases": [{"id": "case-1", "case_number": "2026-CV-10004",
                   "title": "T", "type": "Real Estate", "status": "Active"}]}),
        )])
        .await;
        let result = handler(&server, LegalAction::SearchCases)
            .call(json!({"status": "Active"}))
            .await
            .unwrap();

        let request = server.requests().await.remove(0);
        assert_eq!(request.method, "GET");
        assert_eq!(request.target, "/cases?status=Active");
        let ToolResult::Success { message, data } = result else {
            panic!("expected success");
        };
        assert_eq!(message, "Found 1 cases");
        assert!(matches!(data, ToolData::CaseList(ref c) if c[0].case_type == "Real Estate"));
    }

    #[tokio::test]
    async fn test_create_case_posts_body() {
        let server = TestServer::start(vec![Reply::json(
            200,
            json!({"message": "Case created successfully",
                   "case": {"id": "case-abc123", "case_number": "2026-CV-10005", "title": "Doe v. Roe",
                            "type": "Employment Law", "status": "New"}}),
        )])
        .await;
        let result = handler(&server, LegalAction::CreateLegalCase)
            .call(json!({"title": "Doe v. Roe", "case_type": "Employment Law",
                         "client": "Jane Doe", "attorney_id": "att-003", "estimated_value": 1000}))
            .await
            .unwrap();

        let request = server.requests().await.remove(0);
        assert_eq!(request.method, "POST");
        let sent: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent["type"], "Employment Law");
        assert_eq!(sent["estimated_value"], 1000.0);
        let ToolResult::Success { message, .. } = result else {
            panic!("expected success");
        };
        assert_eq!(message, "Case created successfully: 2026-CV-10005");
    }

    #[tokio::test]
    async fn test_update_without_fields_never_calls_api() {
        let server = TestServer::start(vec![]).await;
        let result = handler(&server, LegalAction::UpdateCaseStatus)
            .call(json!({"case_id": "case-001"}))
            .await
            .unwrap();
        assert_eq!(result.error_reason(), Some("No updates provided"));
        assert!(server.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_detail_is_reported() {
        let server =
            TestServer::start(vec![Reply::json(404, json!({"detail": "Case not found"}))]).await;
        let err = handler(&server, LegalAction::GetCaseDetails)
            .call(json!({"case_id": "case 9"}))
            .await
            .unwrap_err();

        assert_eq!(server.requests().await[0].target, "/cases/case%209");
        assert!(err.to_string().contains("HTTP 404: Case not found"));
    }

    #[tokio::test]
    async fn test_estimate_message_uses_currency_format() {
        let server = TestServer::start(vec![Reply::json(
            200,
            json!({"service": "Partner Attorney Rate", "hourly_rate": 500.0, "hours": 2.5,
                   "subtotal": 1250.0, "tax": 0.0, "total": 1250.0, "currency": "USD"}),
        )])
        .await;
        let result = handler(&server, LegalAction::CalculateLegalEstimate)
            .call(json!({"service": "Partner Attorney Rate", "hours": 2.5}))
            .await
            .unwrap();
        let ToolResult::Success { message, .. } = result else {
            panic!("expected success");
        };
        assert_eq!(message, "Total estimate: $1,250.00");
    }

    #[tokio::test]
    async fn test_client_invoices_summary() {
        let server = TestServer::start(vec![Reply::json(
            200,
            json!({"client_name": "ABC", "invoice_count": 2, "total_billed": 20000.0,
                   "total_paid": 6400.0, "outstanding_balance": 13600.0, "invoices": []}),
        )])
        .await;
        let result = handler(&server, LegalAction::GetClientInvoices)
            .call(json!({"client_name": "ABC"}))
            .await
            .unwrap();
        assert!(matches!(
            result,
            ToolResult::Success { data: ToolData::ClientInvoices(ref s), .. }
                if s.outstanding_balance == 13600.0
        ));
    }
}
