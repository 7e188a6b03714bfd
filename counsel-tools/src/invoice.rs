//! Draft invoice generation with a printable HTML rendering.

use async_trait::async_trait;
use chrono::Local;
use counsel_core::error::ToolError;
use counsel_core::records::{GeneratedInvoice, InvoiceItem, ToolData, ToolResult};
use counsel_core::render::{escape, money};
use counsel_core::router::ActionHandler;
use serde_json::Value;
use std::fmt::Write as _;
use tracing::info;

use crate::args::{opt_f64, opt_str, required_str};
use crate::schema;

const TOOL_NAME: &str = schema::GENERATE_INVOICE;

fn invalid(reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        name: TOOL_NAME.into(),
        reason: reason.into(),
    }
}

/// Parse `items`: each needs a description and a unit amount; quantity
/// defaults to 1. The line amount is `amount × quantity`.
fn parse_items(args: &Value) -> Result<Vec<InvoiceItem>, ToolError> {
    let list = args
        .get("items")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid("'items' must be a non-empty array"))?;

    list.iter()
        .enumerate()
        .map(|(i, item)| {
            let description = opt_str(item, "description")
                .ok_or_else(|| invalid(format!("item {} has no description", i + 1)))?;
            let rate = opt_f64(item, "amount")
                .ok_or_else(|| invalid(format!("item {} has no numeric amount", i + 1)))?;
            let quantity = opt_f64(item, "quantity").unwrap_or(1.0);
            Ok(InvoiceItem {
                description: description.to_string(),
                quantity: Some(quantity),
                rate: Some(rate),
                amount: rate * quantity,
            })
        })
        .collect()
}

fn quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{q:.0}")
    } else {
        q.to_string()
    }
}

/// Printable invoice. Every interpolated value is escaped.
pub fn render_html(invoice: &GeneratedInvoice) -> String {
    let mut html = String::new();
    html.push_str("<div class='counsel-invoice'>");
    let _ = write!(
        html,
        "<h1>INVOICE</h1><p><strong>Invoice #:</strong> {}</p>",
        escape(&invoice.invoice_number)
    );
    let _ = write!(
        html,
        "<div class='bill-to'><h3>Bill To</h3><p>{}</p>",
        escape(&invoice.client_name)
    );
    if let Some(email) = &invoice.client_email {
        let _ = write!(html, "<p>{}</p>", escape(email));
    }
    html.push_str("</div>");
    let _ = write!(
        html,
        "<p><strong>Date Issued:</strong> {}</p><p><strong>Due Date:</strong> {}</p>\
         <p><strong>Status:</strong> {}</p>",
        escape(&invoice.issue_date),
        escape(invoice.due_date.as_deref().unwrap_or("Upon receipt")),
        escape(&invoice.status.to_uppercase())
    );

    html.push_str(
        "<table class='items'><thead><tr><th>Description</th><th>Quantity</th>\
         <th>Rate</th><th>Amount</th></tr></thead><tbody>",
    );
    for item in &invoice.items {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.description),
            quantity(item.quantity.unwrap_or(1.0)),
            money(item.rate.unwrap_or(item.amount)),
            money(item.amount)
        );
    }
    html.push_str("</tbody></table>");

    let _ = write!(
        html,
        "<table class='totals'><tr><td>Subtotal:</td><td>{}</td></tr>\
         <tr><td>Tax:</td><td>{}</td></tr>\
         <tr><td><strong>Total:</strong></td><td><strong>{} {}</strong></td></tr></table>",
        money(invoice.subtotal),
        money(invoice.tax),
        money(invoice.total),
        escape(&invoice.currency)
    );
    if let Some(notes) = &invoice.notes {
        let _ = write!(html, "<div class='notes'><h3>Notes</h3><p>{}</p></div>", escape(notes));
    }
    html.push_str("<p class='thanks'>Thank you for your business!</p></div>");
    html
}

/// `generate_invoice`: computes totals (no tax) and renders a draft.
pub struct GenerateInvoiceHandler;

#[async_trait]
impl ActionHandler for GenerateInvoiceHandler {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        schema::description(TOOL_NAME)
    }

    fn parameters_schema(&self) -> Value {
        schema::parameters(TOOL_NAME)
    }

    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        let client_name = required_str(TOOL_NAME, &args, "client_name")?;
        let items = parse_items(&args)?;
        let now = Local::now();

        let subtotal: f64 = items.iter().map(|i| i.amount).sum();
        let tax = 0.0;
        let mut invoice = GeneratedInvoice {
            invoice_number: opt_str(&args, "invoice_number")
                .map(String::from)
                .unwrap_or_else(|| now.format("INV-%Y%m%d-%H%M%S").to_string()),
            client_name: client_name.to_string(),
            client_email: opt_str(&args, "client_email").map(String::from),
            issue_date: now.format("%Y-%m-%d").to_string(),
            due_date: opt_str(&args, "due_date").map(String::from),
            items,
            subtotal,
            tax,
            total: subtotal + tax,
            currency: "USD".to_string(),
            status: "draft".to_string(),
            notes: opt_str(&args, "notes").map(String::from),
            html: String::new(),
        };
        invoice.html = render_html(&invoice);

        info!(
            invoice_number = %invoice.invoice_number,
            total = invoice.total,
            items = invoice.items.len(),
            "Invoice generated"
        );
        Ok(ToolResult::success(
            format!("Invoice {} generated successfully", invoice.invoice_number),
            ToolData::GeneratedInvoice(invoice),
        ))
    }
}
