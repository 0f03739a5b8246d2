//! Webhook delivery of alert notifications
//!
//! Notifications are posted as Slack-style JSON (`text` fallback plus
//! Block Kit `blocks`). Delivery is a single best-effort attempt bounded by
//! the client timeout.

use crate::error::AlertError;
use crate::events::{AlertCategory, Timestamp};
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// A formatted alert ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub category: AlertCategory,
    /// Short header line, e.g. `🔄 [team-a] FAILOVER Alert`
    pub header: String,
    /// Markdown body describing the event
    pub body: String,
    /// Who owns the deployment
    pub owner: String,
    /// Environment label, e.g. `Production`
    pub environment: String,
    /// When the alert triggered
    pub timestamp: Timestamp,
}

/// Destination for alert notifications
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink {
    /// Attempt delivery once
    ///
    /// # Errors
    ///
    /// Returns `AlertError` on network failure, timeout or a non-success
    /// response. Callers treat every error as non-fatal.
    fn send(&self, notification: &Notification) -> Result<(), AlertError>;
}

/// Top-level webhook body
#[derive(Debug, Serialize)]
pub struct SlackPayload {
    /// Fallback shown in push notifications
    pub text: String,
    pub blocks: Vec<SlackBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Header {
        text: SlackText,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<SlackText>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackText>>,
    },
    Context {
        elements: Vec<SlackText>,
    },
}

#[derive(Debug, Serialize)]
pub struct SlackText {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl SlackText {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: "plain_text",
            text: text.into(),
        }
    }

    fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn",
            text: text.into(),
        }
    }
}

impl SlackPayload {
    /// Lay a notification out as header, owner/environment fields, body and
    /// a timestamp footer
    pub fn from_notification(notification: &Notification) -> Self {
        let category = notification.category;
        let owner = &notification.owner;

        Self {
            text: format!(
                "{} *[{}]* Blue/Green Alert - {}",
                category.emoji(),
                owner,
                category.label()
            ),
            blocks: vec![
                SlackBlock::Header {
                    text: SlackText::plain(notification.header.clone()),
                },
                SlackBlock::Section {
                    text: None,
                    fields: Some(vec![
                        SlackText::mrkdwn(format!("*Owner:*\n{}", owner)),
                        SlackText::mrkdwn(format!(
                            "*Environment:*\n{}",
                            notification.environment
                        )),
                    ]),
                },
                SlackBlock::Section {
                    text: Some(SlackText::mrkdwn(notification.body.clone())),
                    fields: None,
                },
                SlackBlock::Context {
                    elements: vec![SlackText::mrkdwn(format!(
                        "⏰ {} | 🔧 {}",
                        notification.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                        owner
                    ))],
                },
            ],
        }
    }
}

/// Posts notifications to a Slack-compatible incoming webhook
///
/// The sink is called from the synchronous stream driver, so it owns a
/// small current-thread runtime and blocks on each request.
pub struct SlackWebhook {
    client: Client,
    url: String,
    runtime: tokio::runtime::Runtime,
}

impl SlackWebhook {
    /// Create a webhook sink
    ///
    /// # Arguments
    ///
    /// * `url` - Incoming webhook endpoint
    /// * `timeout` - Upper bound for one delivery attempt
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if the HTTP client or runtime cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(url, client)
    }

    /// Create a webhook sink around a preconfigured HTTP client
    pub fn with_client(url: impl Into<String>, client: Client) -> Result<Self, AlertError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                AlertError::NotificationFailed(format!("Failed to start HTTP runtime: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
            runtime,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, payload: &SlackPayload) -> Result<(), AlertError> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AlertError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Webhook accepted notification with status {}", status);
        Ok(())
    }
}

impl NotificationSink for SlackWebhook {
    fn send(&self, notification: &Notification) -> Result<(), AlertError> {
        let payload = SlackPayload::from_notification(notification);
        self.runtime.block_on(self.post(&payload))
    }
}
