//! Slack sink — attachment-style webhook messages for scaling decisions

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::{AutoscalerError, Result};
use crate::notification::{NotificationPayload, Notifier};

/// Timeout for one webhook delivery, well inside the tick deadline
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack incoming-webhook notifier
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel: String,
    cluster_name: String,
    username: String,
    icon: String,
}

impl SlackNotifier {
    /// Create a notifier posting to the given webhook URL. An empty
    /// `channel` keeps the webhook's default channel.
    pub fn new(
        webhook_url: impl Into<String>,
        channel: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            channel: channel.into(),
            cluster_name: cluster_name.into(),
            username: "autoscaler".to_string(),
            icon: "scales".to_string(),
        })
    }

    fn build_message(&self, payload: &NotificationPayload) -> WebhookMessage {
        let attachment = Attachment {
            color: "good".to_string(),
            author_icon: self.icon.clone(),
            pretext: "Autoscaler has made a change in deployment".to_string(),
            footer: format!("autoscaler @ {}", payload.changed_at.to_rfc3339()),
            fields: vec![
                AttachmentField::long("Decision", &payload.decision),
                AttachmentField::long("Last probe results", &join_samples(&payload.last_probe_results)),
                AttachmentField::long("Cluster name", &self.cluster_name),
                AttachmentField::short("Deployment", &payload.deployment),
                AttachmentField::short("Namespace", &payload.namespace),
                AttachmentField::short("Environment", &payload.environment),
                AttachmentField::short("Source", &payload.source),
            ],
        };

        WebhookMessage {
            username: self.username.clone(),
            icon_emoji: self.icon.clone(),
            channel: self.channel.clone(),
            attachments: vec![attachment],
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn kind(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        let message = self.build_message(payload);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                AutoscalerError::Notification(format!("slack webhook request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AutoscalerError::Notification(format!(
                "slack webhook returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Webhook message body
#[derive(Debug, Serialize)]
struct WebhookMessage {
    username: String,
    icon_emoji: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    channel: String,
    attachments: Vec<Attachment>,
}

/// Slack attachment block
#[derive(Debug, Serialize)]
struct Attachment {
    color: String,
    author_icon: String,
    pretext: String,
    footer: String,
    fields: Vec<AttachmentField>,
}

/// One titled value inside an attachment
#[derive(Debug, Serialize)]
struct AttachmentField {
    title: String,
    value: String,
    short: bool,
}

impl AttachmentField {
    fn long(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: false,
        }
    }

    fn short(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: true,
        }
    }
}

/// Render samples as a comma-separated list
fn join_samples(samples: &[i64]) -> String {
    samples
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
