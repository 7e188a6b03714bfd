//! Normalized tool results and the domain records they carry.
//!
//! Every handler, whether it reads the local store or calls a remote API,
//! produces a [`ToolResult`]. Payloads are a closed [`ToolData`] union so the
//! renderer handles each tool family exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one tool invocation. Produced exactly once per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { message: String, data: ToolData },
    Failure { kind: FailureKind, reason: String },
}

/// Why an invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Arguments were not a JSON object.
    InvalidArguments,
    /// No handler is registered under the name.
    UnknownFunction,
    /// The handler ran and reported failure, errored, panicked, or timed out.
    Execution,
}

impl ToolResult {
    pub fn success(message: impl Into<String>, data: ToolData) -> Self {
        ToolResult::Success {
            message: message.into(),
            data,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        ToolResult::Failure {
            kind: FailureKind::Execution,
            reason: reason.into(),
        }
    }

    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        ToolResult::Failure {
            kind: FailureKind::InvalidArguments,
            reason: reason.into(),
        }
    }

    pub fn unknown_function() -> Self {
        ToolResult::Failure {
            kind: FailureKind::UnknownFunction,
            reason: "unknown function".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { reason, .. } => Some(reason),
        }
    }
}

/// Family-specific payload of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "value", rename_all = "snake_case")]
pub enum ToolData {
    Case(CaseRecord),
    CaseList(Vec<CaseRecord>),
    Attorney(AttorneyRecord),
    AttorneyList(Vec<AttorneyRecord>),
    Invoice(InvoiceRecord),
    InvoiceList(Vec<InvoiceRecord>),
    ClientInvoices(ClientInvoices),
    Rates(Vec<LegalRate>),
    Estimate(Estimate),
    GeneratedInvoice(GeneratedInvoice),
    Notification(Notification),
    ApiResponse(ApiResponse),
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseRecord {
    pub id: String,
    pub case_number: String,
    pub title: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub status: String,
    pub filed_date: Option<String>,
    pub attorney_id: Option<String>,
    pub client: Option<String>,
    pub next_hearing: Option<String>,
    pub estimated_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attorney: Option<AttorneyRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttorneyRecord {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub hourly_rate: f64,
    pub years_experience: Option<u32>,
    pub bar_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_cases: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cases: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub rate: Option<f64>,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceRecord {
    pub id: String,
    pub invoice_number: String,
    pub invoice_name: Option<String>,
    pub client_name: String,
    pub client_email: Option<String>,
    #[serde(alias = "date")]
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub status: String,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: f64,
    pub paid_amount: Option<f64>,
    pub balance: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInvoices {
    pub client_name: String,
    pub invoice_count: usize,
    pub total_billed: f64,
    pub total_paid: f64,
    pub outstanding_balance: f64,
    pub invoices: Vec<InvoiceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalRate {
    pub service: String,
    pub rate: f64,
    pub unit: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimate {
    pub service: String,
    pub hourly_rate: f64,
    pub hours: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedInvoice {
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub issue_date: String,
    pub due_date: Option<String>,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub status: String,
    pub notes: Option<String>,
    /// Printable HTML rendering of the invoice.
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Teams,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "Email"),
            NotificationChannel::Teams => write!(f, "Teams"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: NotificationChannel,
    /// Recipient address or webhook host.
    pub recipient: String,
    pub subject: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}
