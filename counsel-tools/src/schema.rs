//! Function names, descriptions, and argument schemas offered to the model.
//!
//! A name served by both the local store and the legal API shares one
//! schema, so the model sees the same contract whichever tier answers.

use serde_json::{Value, json};

pub const SEARCH_CASES: &str = "search_cases";
pub const GET_CASE_DETAILS: &str = "get_case_details";
pub const CREATE_LEGAL_CASE: &str = "create_legal_case";
pub const UPDATE_CASE_STATUS: &str = "update_case_status";
pub const GET_ATTORNEY_INFO: &str = "get_attorney_info";
pub const GET_LEGAL_RATES: &str = "get_legal_rates";
pub const CALCULATE_LEGAL_ESTIMATE: &str = "calculate_legal_estimate";
pub const SEARCH_INVOICES: &str = "search_invoices";
pub const GET_INVOICE: &str = "get_invoice";
pub const GET_CLIENT_INVOICES: &str = "get_client_invoices";
pub const CALL_EXTERNAL_API: &str = "call_external_api";
pub const SEND_EMAIL_NOTIFICATION: &str = "send_email_notification";
pub const SEND_TEAMS_NOTIFICATION: &str = "send_teams_notification";
pub const GENERATE_INVOICE: &str = "generate_invoice";

pub fn description(name: &str) -> &'static str {
    match name {
        SEARCH_CASES => "Search legal cases by status, case type, or assigned attorney.",
        GET_CASE_DETAILS => {
            "Get full details of a legal case, including the assigned attorney, by case number or id."
        }
        CREATE_LEGAL_CASE => "Open a new legal case for a client and assign an attorney.",
        UPDATE_CASE_STATUS => {
            "Update a case's status, next hearing date, or estimated value."
        }
        GET_ATTORNEY_INFO => {
            "Get an attorney by id, or list attorneys filtered by specialty and availability."
        }
        GET_LEGAL_RATES => "List the firm's legal service rates, optionally filtered by service.",
        CALCULATE_LEGAL_ESTIMATE => {
            "Estimate the cost of a legal service for a number of hours."
        }
        SEARCH_INVOICES => "Search invoices by client name, invoice name, or invoice number.",
        GET_INVOICE => "Get one invoice with its line items by invoice number or id.",
        GET_CLIENT_INVOICES => {
            "Summarize all invoices for a client: totals billed, paid, and outstanding."
        }
        CALL_EXTERNAL_API => "Call an external REST API and return its JSON response.",
        SEND_EMAIL_NOTIFICATION => "Queue an email notification to a recipient.",
        SEND_TEAMS_NOTIFICATION => "Post a notification card to a Microsoft Teams channel webhook.",
        GENERATE_INVOICE => {
            "Generate a draft invoice with line items and a printable HTML rendering."
        }
        _ => "",
    }
}

pub fn parameters(name: &str) -> Value {
    match name {
        SEARCH_CASES => json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "description": "Case status, e.g. Active, Closed, New"},
                "case_type": {"type": "string", "description": "Case type, e.g. Contract Dispute"},
                "attorney_id": {"type": "string", "description": "Assigned attorney id, e.g. att-001"}
            }
        }),
        GET_CASE_DETAILS => json!({
            "type": "object",
            "properties": {
                "case_id": {"type": "string", "description": "Case number (2025-CV-10001) or id (case-001)"}
            },
            "required": ["case_id"]
        }),
        CREATE_LEGAL_CASE => json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Case title, e.g. Smith v. Jones"},
                "case_type": {"type": "string", "description": "Type of case"},
                "client": {"type": "string", "description": "Client name"},
                "attorney_id": {"type": "string", "description": "Assigned attorney id"},
                "estimated_value": {"type": "number", "description": "Estimated case value in USD"}
            },
            "required": ["title", "case_type", "client", "attorney_id"]
        }),
        UPDATE_CASE_STATUS => json!({
            "type": "object",
            "properties": {
                "case_id": {"type": "string", "description": "Case number or id"},
                "status": {"type": "string", "description": "New status"},
                "next_hearing": {"type": "string", "description": "Next hearing date (YYYY-MM-DD)"},
                "estimated_value": {"type": "number", "description": "Updated estimated value in USD"}
            },
            "required": ["case_id"]
        }),
        GET_ATTORNEY_INFO => json!({
            "type": "object",
            "properties": {
                "attorney_id": {"type": "string", "description": "Attorney id; omit to list attorneys"},
                "specialty": {"type": "string", "description": "Filter the list by specialty"},
                "available_only": {"type": "boolean", "description": "List only available attorneys"}
            }
        }),
        GET_LEGAL_RATES => json!({
            "type": "object",
            "properties": {
                "service_type": {"type": "string", "description": "Filter by service name"}
            }
        }),
        CALCULATE_LEGAL_ESTIMATE => json!({
            "type": "object",
            "properties": {
                "service": {"type": "string", "description": "Service name, e.g. Partner Attorney Rate"},
                "hours": {"type": "number", "description": "Estimated hours"}
            },
            "required": ["service", "hours"]
        }),
        SEARCH_INVOICES => json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Client name, invoice name, or invoice number"}
            },
            "required": ["query"]
        }),
        GET_INVOICE => json!({
            "type": "object",
            "properties": {
                "invoice_id": {"type": "string", "description": "Invoice number (INV-2026-001) or id"}
            },
            "required": ["invoice_id"]
        }),
        GET_CLIENT_INVOICES => json!({
            "type": "object",
            "properties": {
                "client_name": {"type": "string", "description": "Client name or part of it"}
            },
            "required": ["client_name"]
        }),
        CALL_EXTERNAL_API => json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL"},
                "method": {"type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]},
                "headers": {"type": "object", "description": "Request headers"},
                "data": {"type": "object", "description": "JSON request body"},
                "params": {"type": "object", "description": "Query string parameters"}
            },
            "required": ["url"]
        }),
        SEND_EMAIL_NOTIFICATION => json!({
            "type": "object",
            "properties": {
                "recipient": {"type": "string", "description": "Recipient email address"},
                "subject": {"type": "string"},
                "body": {"type": "string"},
                "cc": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["recipient", "subject", "body"]
        }),
        SEND_TEAMS_NOTIFICATION => json!({
            "type": "object",
            "properties": {
                "webhook_url": {"type": "string", "description": "Incoming webhook URL"},
                "title": {"type": "string"},
                "message": {"type": "string"},
                "color": {"type": "string", "description": "Hex theme color, default 0078D4"}
            },
            "required": ["webhook_url", "title", "message"]
        }),
        GENERATE_INVOICE => json!({
            "type": "object",
            "properties": {
                "client_name": {"type": "string"},
                "client_email": {"type": "string"},
                "invoice_number": {"type": "string", "description": "Generated when omitted"},
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": {"type": "string"},
                            "amount": {"type": "number", "description": "Unit amount"},
                            "quantity": {"type": "number", "description": "Defaults to 1"}
                        },
                        "required": ["description", "amount"]
                    }
                },
                "due_date": {"type": "string", "description": "YYYY-MM-DD"},
                "notes": {"type": "string"}
            },
            "required": ["client_name", "items"]
        }),
        _ => json!({"type": "object", "properties": {}}),
    }
}
