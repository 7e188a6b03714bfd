//! Notification handlers: e-mail (queued receipt only) and Teams webhooks.

use async_trait::async_trait;
use chrono::Utc;
use counsel_core::error::ToolError;
use counsel_core::records::{Notification, NotificationChannel, ToolData, ToolResult};
use counsel_core::router::ActionHandler;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

use crate::args::{opt_str, required_str};
use crate::schema;

const DEFAULT_THEME_COLOR: &str = "0078D4";

/// `send_email_notification`. There is no mail transport; the request is
/// logged and acknowledged as queued.
pub struct EmailNotificationHandler;

#[async_trait]
impl ActionHandler for EmailNotificationHandler {
    fn name(&self) -> &str {
        schema::SEND_EMAIL_NOTIFICATION
    }

    fn description(&self) -> &str {
        schema::description(schema::SEND_EMAIL_NOTIFICATION)
    }

    fn parameters_schema(&self) -> Value {
        schema::parameters(schema::SEND_EMAIL_NOTIFICATION)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        let name = schema::SEND_EMAIL_NOTIFICATION;
        let recipient = required_str(name, &args, "recipient")?;
        let subject = required_str(name, &args, "subject")?;
        let body = required_str(name, &args, "body")?;
        if !recipient.contains('@') {
            return Err(ToolError::InvalidArguments {
                name: name.into(),
                reason: format!("'{recipient}' is not an email address"),
            });
        }
        let cc: Vec<&str> = args
            .get("cc")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        info!(recipient, subject, cc = ?cc, body_len = body.len(), "Email notification queued");
        Ok(ToolResult::success(
            "Email notification queued successfully",
            ToolData::Notification(Notification {
                channel: NotificationChannel::Email,
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                status: "queued".to_string(),
            }),
        ))
    }
}

/// `send_teams_notification`: posts a MessageCard to an incoming webhook.
pub struct TeamsNotificationHandler {
    http: reqwest::Client,
}

impl TeamsNotificationHandler {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                name: schema::SEND_TEAMS_NOTIFICATION.into(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http })
    }
}

fn message_card(title: &str, message: &str, color: &str) -> Value {
    json!({
        "@type": "MessageCard",
        "@context": "https://schema.org/extensions",
        "summary": title,
        "themeColor": color,
        "title": title,
        "sections": [{
            "activityTitle": "Legal Document Agent",
            "activitySubtitle": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "text": message,
            "markdown": true
        }]
    })
}

#[async_trait]
impl ActionHandler for TeamsNotificationHandler {
    fn name(&self) -> &str {
        schema::SEND_TEAMS_NOTIFICATION
    }

    fn description(&self) -> &str {
        schema::description(schema::SEND_TEAMS_NOTIFICATION)
    }

    fn parameters_schema(&self) -> Value {
        schema::parameters(schema::SEND_TEAMS_NOTIFICATION)
    }

    async fn call(&self, args: Value) -> Result<ToolResult, ToolError> {
        let name = schema::SEND_TEAMS_NOTIFICATION;
        let webhook = required_str(name, &args, "webhook_url")?;
        let title = required_str(name, &args, "title")?;
        let message = required_str(name, &args, "message")?;
        let color = opt_str(&args, "color")
            .map(|c| c.trim_start_matches('#'))
            .unwrap_or(DEFAULT_THEME_COLOR);

        let host = reqwest::Url::parse(webhook)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .ok_or_else(|| ToolError::InvalidArguments {
                name: name.into(),
                reason: format!("invalid webhook_url: {webhook}"),
            })?;

        let response = self
            .http
            .post(webhook)
            .json(&message_card(title, message, color))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: name.into(),
                message: format!("Teams webhook request failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            warn!(%host, status = status.as_u16(), "Teams webhook rejected the card");
            return Ok(ToolResult::failure(format!(
                "Teams webhook returned HTTP {}",
                status.as_u16()
            )));
        }

        info!(%host, title, "Teams notification sent");
        Ok(ToolResult::success(
            "Teams notification sent successfully",
            ToolData::Notification(Notification {
                channel: NotificationChannel::Teams,
                recipient: host,
                subject: title.to_string(),
                status: "sent".to_string(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{Reply, TestServer};

    #[tokio::test]
    async fn test_email_is_queued() {
        let result = EmailNotificationHandler
            .call(json!({
                "recipient": "client@example.com",
                "subject": "Hearing moved",
                "body": "The hearing is now on March 3.",
                "cc": ["paralegal@lawfirm.com"]
            }))
            .await
            .unwrap();
        let ToolResult::Success { message, data: ToolData::Notification(n) } = result else {
            panic!("expected notification");
        };
        assert_eq!(message, "Email notification queued successfully");
        assert_eq!(n.channel, NotificationChannel::Email);
        assert_eq!(n.status, "queued");
    }

    #[tokio::test]
    async fn test_email_requires_an_address() {
        let err = EmailNotificationHandler
            .call(json!({"recipient": "bob", "subject": "s", "body": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_message_card_shape() {
        let card = message_card("Invoice overdue", "INV-2026-003 is **overdue**", "FF0000");
        assert_eq!(card["@type"], "MessageCard");
        assert_eq!(card["themeColor"], "FF0000");
        assert_eq!(card["sections"][0]["activityTitle"], "Legal Document Agent");
        assert_eq!(card["sections"][0]["markdown"], true);
    }

    #[tokio::test]
    async fn test_teams_posts_card_with_default_color() {
        let server = TestServer::start(vec![Reply::text(200, "1")]).await;
        let handler = TeamsNotificationHandler::new(Duration::from_secs(5)).unwrap();
        let result = handler
            .call(json!({
                "webhook_url": format!("{}/webhook", server.url()),
                "title": "Case update",
                "message": "Smith v. Jones settled"
            }))
            .await
            .unwrap();

        let request = server.requests().await.remove(0);
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/webhook");
        let card: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(card["themeColor"], DEFAULT_THEME_COLOR);
        assert_eq!(card["sections"][0]["text"], "Smith v. Jones settled");
        assert!(matches!(
            result,
            ToolResult::Success { data: ToolData::Notification(ref n), .. }
                if n.recipient == "127.0.0.1" && n.status == "sent"
        ));
    }

    #[tokio::test]
    async fn test_teams_rejection_is_a_failure() {
        let server = TestServer::start(vec![Reply::text(400, "Bad payload")]).await;
        let handler = TeamsNotificationHandler::new(Duration::from_secs(5)).unwrap();
        let result = handler
            .call(json!({"webhook_url": server.url(), "title": "t", "message": "m"}))
            .await
            .unwrap();
        assert_eq!(result.error_reason(), Some("Teams webhook returned HTTP 400"));
    }
}
