//! HTML rendering of turn fragments.
//!
//! Every interpolated value goes through [`escape`]. Blocks are
//! self-contained so fragments can be concatenated in emission order.

use crate::records::{
    AttorneyRecord, CaseRecord, ClientInvoices, Estimate, FailureKind, GeneratedInvoice,
    InvoiceRecord, LegalRate, Notification, ToolData, ToolResult,
};
use crate::types::ContextBlock;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `$1,234.50`
pub fn money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}

fn or_na(value: Option<&str>) -> String {
    escape(value.filter(|v| !v.is_empty()).unwrap_or("N/A"))
}

fn row(label: &str, value_html: &str) -> String {
    format!("<tr><td><strong>{label}:</strong></td><td>{value_html}</td></tr>")
}

fn badge(text: &str) -> String {
    format!("<span class='counsel-badge'>{}</span>", escape(text))
}

/// Banner emitted once before the first tool-result block of a turn.
pub fn tools_banner() -> String {
    "<div class='counsel-banner'>🔧 Executing actions...</div>".to_string()
}

/// A success or failure block for one invocation.
pub fn tool_result(function_name: &str, result: &ToolResult) -> String {
    let name = escape(function_name);
    match result {
        ToolResult::Success { message, data } => {
            let mut html = format!(
                "<div class='counsel-action counsel-action-ok'>\
                 <p><strong>✓ Action Completed: {name}</strong></p>\
                 <p>{}</p>",
                escape(if message.is_empty() { "Success" } else { message })
            );
            html.push_str(&tool_data(data));
            if !matches!(data, ToolData::Empty | ToolData::GeneratedInvoice(_)) {
                let raw = serde_json::to_string_pretty(data).unwrap_or_default();
                html.push_str(&format!(
                    "<details><summary>View Raw Data</summary><pre>{}</pre></details>",
                    escape(&raw)
                ));
            }
            html.push_str("</div>");
            html
        }
        ToolResult::Failure { kind, reason } => {
            let title = match kind {
                FailureKind::InvalidArguments => format!("✗ Invalid Arguments: {name}"),
                FailureKind::UnknownFunction | FailureKind::Execution => {
                    format!("✗ Action Failed: {name}")
                }
            };
            format!(
                "<div class='counsel-action counsel-action-failed'>\
                 <p><strong>{title}</strong></p><p>{}</p></div>",
                escape(reason)
            )
        }
    }
}

/// Family-specific body of a successful result.
pub fn tool_data(data: &ToolData) -> String {
    let body = match data {
        ToolData::Case(case) => case_details(case),
        ToolData::CaseList(cases) => case_list(cases),
        ToolData::Attorney(attorney) => attorney_details(attorney),
        ToolData::AttorneyList(attorneys) => attorney_list(attorneys),
        ToolData::Invoice(invoice) => invoice_details(invoice),
        ToolData::InvoiceList(invoices) => invoice_list(invoices),
        ToolData::ClientInvoices(summary) => client_invoices(summary),
        ToolData::Rates(rates) => rate_table(rates),
        ToolData::Estimate(estimate) => estimate_table(estimate),
        ToolData::GeneratedInvoice(invoice) => return generated_invoice(invoice),
        ToolData::Notification(notification) => notification_receipt(notification),
        ToolData::ApiResponse(response) => format!(
            "<p>HTTP status {}</p>",
            response.status_code
        ),
        ToolData::Empty => return String::new(),
    };
    format!("<div class='counsel-action-body'>{body}</div>")
}

fn case_details(case: &CaseRecord) -> String {
    let mut html = format!(
        "<h4>{}</h4><table>",
        escape(if case.title.is_empty() { "Unknown Case" } else { &case.title })
    );
    html.push_str(&row("Case Number", &or_na(Some(&case.case_number))));
    html.push_str(&row("Type", &or_na(Some(&case.case_type))));
    html.push_str(&row("Status", &badge(&case.status)));
    html.push_str(&row("Client", &or_na(case.client.as_deref())));
    html.push_str(&row("Filed Date", &or_na(case.filed_date.as_deref())));
    match &case.attorney {
        Some(attorney) => {
            html.push_str(&row(
                "Attorney",
                &format!("{} ({})", escape(&attorney.name), escape(&attorney.specialty)),
            ));
            html.push_str(&row("Contact", &or_na(attorney.email.as_deref())));
        }
        None => html.push_str(&row("Attorney ID", &or_na(case.attorney_id.as_deref()))),
    }
    if let Some(hearing) = case.next_hearing.as_deref().filter(|h| !h.is_empty()) {
        html.push_str(&row("Next Hearing", &escape(hearing)));
    }
    if let Some(value) = case.estimated_value.filter(|v| *v > 0.0) {
        html.push_str(&row("Estimated Value", &money(value)));
    }
    html.push_str("</table>");
    html
}

fn case_list(cases: &[CaseRecord]) -> String {
    if cases.is_empty() {
        return "<p>No cases found.</p>".to_string();
    }
    let mut html = format!("<p><strong>Found {} case(s):</strong></p><ul>", cases.len());
    for case in cases {
        html.push_str(&format!(
            "<li><strong>{}</strong> ({})<br><span>Type: {} | Status: {} | Client: {}</span></li>",
            escape(&case.title),
            or_na(Some(&case.case_number)),
            or_na(Some(&case.case_type)),
            or_na(Some(&case.status)),
            or_na(case.client.as_deref()),
        ));
    }
    html.push_str("</ul>");
    html
}

fn attorney_details(attorney: &AttorneyRecord) -> String {
    let mut html = format!("<h4>{}</h4><table>", escape(&attorney.name));
    html.push_str(&row("Specialty", &or_na(Some(&attorney.specialty))));
    html.push_str(&row(
        "Experience",
        &format!("{} years", attorney.years_experience.unwrap_or(0)),
    ));
    html.push_str(&row("Hourly Rate", &format!("{}/hour", money(attorney.hourly_rate))));
    html.push_str(&row("Bar Number", &or_na(attorney.bar_number.as_deref())));
    html.push_str(&row("Email", &or_na(attorney.email.as_deref())));
    html.push_str(&row("Phone", &or_na(attorney.phone.as_deref())));
    html.push_str(&row(
        "Available",
        if attorney.available { "✓ Yes" } else { "✗ No" },
    ));
    html.push_str("</table>");
    html
}

fn attorney_list(attorneys: &[AttorneyRecord]) -> String {
    if attorneys.is_empty() {
        return "<p>No attorneys found.</p>".to_string();
    }
    let mut html = format!("<p><strong>Found {} attorney(s):</strong></p><ul>", attorneys.len());
    for a in attorneys {
        html.push_str(&format!(
            "<li><strong>{}</strong> ({}) {}/hour{}</li>",
            escape(&a.name),
            escape(&a.specialty),
            money(a.hourly_rate),
            if a.available { "" } else { " (unavailable)" }
        ));
    }
    html.push_str("</ul>");
    html
}

fn invoice_details(invoice: &InvoiceRecord) -> String {
    let mut html = format!("<h4>Invoice {}</h4><table>", or_na(Some(&invoice.invoice_number)));
    html.push_str(&row("Client", &or_na(Some(&invoice.client_name))));
    html.push_str(&row("Date", &or_na(invoice.issue_date.as_deref())));
    html.push_str(&row("Status", &badge(&invoice.status)));
    html.push_str(&row("Total", &format!("<strong>{}</strong>", money(invoice.total))));
    if let Some(balance) = invoice.balance {
        html.push_str(&row("Balance", &money(balance)));
    }
    html.push_str("</table>");
    if !invoice.items.is_empty() {
        html.push_str("<p><strong>Line Items:</strong></p><ul>");
        for item in &invoice.items {
            html.push_str(&format!(
                "<li>{}: {}</li>",
                escape(&item.description),
                money(item.amount)
            ));
        }
        html.push_str("</ul>");
    }
    html
}

fn invoice_list(invoices: &[InvoiceRecord]) -> String {
    if invoices.is_empty() {
        return "<p>No invoices found.</p>".to_string();
    }
    let mut html = format!("<p><strong>Found {} invoice(s):</strong></p><ul>", invoices.len());
    for inv in invoices {
        html.push_str(&format!(
            "<li><strong>{}</strong> - {}<br><span>Date: {} | Amount: {} | Status: {}</span></li>",
            or_na(Some(&inv.invoice_number)),
            or_na(Some(&inv.client_name)),
            or_na(inv.issue_date.as_deref()),
            money(inv.total),
            or_na(Some(&inv.status)),
        ));
    }
    html.push_str("</ul>");
    html
}

fn client_invoices(summary: &ClientInvoices) -> String {
    let mut html = format!(
        "<h4>Invoices for {}</h4><p><strong>Total Billed: {}</strong> | Paid: {} | Outstanding: {}</p>",
        escape(&summary.client_name),
        money(summary.total_billed),
        money(summary.total_paid),
        money(summary.outstanding_balance),
    );
    if !summary.invoices.is_empty() {
        html.push_str("<ul>");
        for inv in &summary.invoices {
            html.push_str(&format!(
                "<li>{} - {} {}<br><span>{}</span></li>",
                or_na(Some(&inv.invoice_number)),
                money(inv.total),
                badge(&inv.status),
                or_na(inv.issue_date.as_deref()),
            ));
        }
        html.push_str("</ul>");
    }
    html
}

fn rate_table(rates: &[LegalRate]) -> String {
    if rates.is_empty() {
        return "<p>No rates available.</p>".to_string();
    }
    let mut html =
        "<p><strong>Legal Service Rates:</strong></p><table><tr><th>Service</th><th>Rate</th></tr>"
            .to_string();
    for rate in rates {
        let unit = if rate.unit.is_empty() { "hour" } else { &rate.unit };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}/{}</td></tr>",
            escape(&rate.service),
            money(rate.rate),
            escape(unit)
        ));
    }
    html.push_str("</table>");
    html
}

fn estimate_table(estimate: &Estimate) -> String {
    let mut html = "<h4>Cost Estimate</h4><table>".to_string();
    html.push_str(&row("Service", &or_na(Some(&estimate.service))));
    html.push_str(&row("Hours", &estimate.hours.to_string()));
    html.push_str(&row("Hourly Rate", &money(estimate.hourly_rate)));
    html.push_str(&row(
        "Total Estimate",
        &format!("<strong>{}</strong>", money(estimate.total)),
    ));
    html.push_str("</table>");
    html
}

fn generated_invoice(invoice: &GeneratedInvoice) -> String {
    // `invoice.html` is produced by the invoice handler from escaped values.
    format!(
        "<details><summary>View Invoice {} ({})</summary>{}</details>",
        escape(&invoice.invoice_number),
        money(invoice.total),
        invoice.html
    )
}

fn notification_receipt(notification: &Notification) -> String {
    format!(
        "<p>{} notification to {}: {} ({})</p>",
        notification.channel,
        escape(&notification.recipient),
        escape(&notification.subject),
        escape(&notification.status)
    )
}

/// Sources block listing the cited document titles.
pub fn sources(blocks: &[ContextBlock], cited: &[usize]) -> String {
    let titles: Vec<&str> = cited
        .iter()
        .filter_map(|i| {
            blocks.iter().find_map(|b| match b {
                ContextBlock::Document { index, title, .. } if index == i => Some(title.as_str()),
                _ => None,
            })
        })
        .collect();
    if titles.is_empty() {
        return String::new();
    }
    let mut html = format!(
        "<div class='counsel-sources'><strong>📚 Sources ({} document{}):</strong>",
        titles.len(),
        if titles.len() == 1 { "" } else { "s" }
    );
    for title in titles {
        html.push_str(&format!("<div class='counsel-source'>📄 {}</div>", escape(title)));
    }
    html.push_str("</div>");
    html
}

/// Notice shown when no document survived retrieval.
pub fn no_documents(query: &str) -> String {
    format!(
        "<div class='counsel-notice'><p><strong>No documents found</strong></p>\
         <p>I searched for '{}' but couldn't find matching documents. Try uploading \
         documents first or ask about different topics.</p></div>",
        escape(query)
    )
}

/// Raw evidence shown when the completion stream fails.
pub fn fallback_summary(blocks: &[ContextBlock]) -> String {
    let documents: Vec<(&str, &str)> = blocks
        .iter()
        .filter_map(|b| match b {
            ContextBlock::Document { title, content, .. } => Some((title.as_str(), content.as_str())),
            ContextBlock::NoRelevantDocuments => None,
        })
        .collect();
    let mut html = format!(
        "<div class='counsel-fallback'><p><strong>Found {} relevant document(s):</strong></p>",
        documents.len()
    );
    for (title, content) in documents {
        html.push_str(&format!(
            "<div class='counsel-evidence'><div class='counsel-evidence-title'>📄 {}</div><div>{}</div></div>",
            escape(title),
            escape(content).replace('\n', "<br>")
        ));
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{InvoiceItem, NotificationChannel};

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"A&B\"</b>'"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;&#39;");
    }

    #[test]
    fn test_money() {
        assert_eq!(money(4300.0), "$4,300.00");
        assert_eq!(money(1234567.891), "$1,234,567.89");
        assert_eq!(money(0.5), "$0.50");
        assert_eq!(money(-12.0), "-$12.00");
        assert_eq!(money(999.0), "$999.00");
    }

    #[test]
    fn test_failure_blocks() {
        let html = tool_result("launch_rocket", &ToolResult::unknown_function());
        assert!(html.contains("✗ Action Failed: launch_rocket"));
        assert!(html.contains("unknown function"));

        let html = tool_result("get_invoice", &ToolResult::invalid_arguments("bad json"));
        assert!(html.contains("✗ Invalid Arguments: get_invoice"));
    }

    #[test]
    fn test_success_block_escapes_and_includes_raw() {
        let invoice = InvoiceRecord {
            invoice_number: "INV-2026-003".into(),
            client_name: "<script>alert(1)</script>".into(),
            status: "OUTSTANDING".into(),
            total: 4300.0,
            items: vec![InvoiceItem {
                description: "Research".into(),
                amount: 2500.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let html = tool_result(
            "get_invoice",
            &ToolResult::success("Found invoice", ToolData::Invoice(invoice)),
        );
        assert!(html.contains("✓ Action Completed: get_invoice"));
        assert!(html.contains("Invoice INV-2026-003"));
        assert!(html.contains("$4,300.00"));
        assert!(html.contains("Research: $2,500.00"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("View Raw Data"));
    }

    #[test]
    fn test_notification_receipt() {
        let html = tool_data(&ToolData::Notification(Notification {
            channel: NotificationChannel::Email,
            recipient: "client@example.com".into(),
            subject: "Case update".into(),
            status: "queued".into(),
        }));
        assert!(html.contains("Email notification to client@example.com"));
    }

    #[test]
    fn test_sources_block() {
        let blocks = vec![
            ContextBlock::Document {
                index: 1,
                title: "NDA.pdf".into(),
                content: String::new(),
            },
            ContextBlock::Document {
                index: 2,
                title: "MSA.pdf".into(),
                content: String::new(),
            },
        ];
        let html = sources(&blocks, &[2]);
        assert!(html.contains("Sources (1 document)"));
        assert!(html.contains("MSA.pdf"));
        assert!(!html.contains("NDA.pdf"));
        assert!(sources(&blocks, &[1, 2]).contains("Sources (2 documents)"));
        assert!(sources(&blocks, &[]).is_empty());
    }

    #[test]
    fn test_fallback_summary() {
        let blocks = vec![ContextBlock::Document {
            index: 1,
            title: "Rates.pdf".into(),
            content: "Partner: $500\nAssociate: $300".into(),
        }];
        let html = fallback_summary(&blocks);
        assert!(html.contains("Found 1 relevant document(s)"));
        assert!(html.contains("Partner: $500<br>Associate: $300"));
    }

    #[test]
    fn test_no_documents_escapes_query() {
        assert!(no_documents("<x>").contains("&lt;x&gt;"));
    }
}
