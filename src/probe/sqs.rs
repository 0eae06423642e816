//! Queue-depth probe — sums visible and in-flight SQS messages
//!
//! Construction resolves every configured queue name to its URL, so a
//! missing queue fails the scaler at startup rather than on every tick.
//! The SQS calls sit behind a narrow trait so the summation logic is
//! testable without AWS.

use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AutoscalerError, Result};
use crate::probe::Probe;

/// `sqs` section of a workload's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsProbeConfig {
    /// Queue names whose depths are summed into one sample
    #[serde(default)]
    pub queues: Vec<String>,
}

/// The two SQS operations the probe performs
#[async_trait]
trait SqsQueueApi: Send + Sync {
    /// Resolve a queue name to its queue URL
    async fn resolve_queue_url(&self, queue: &str) -> Result<String>;

    /// Raw values of the approximate visible and not-visible message
    /// count attributes of a queue
    async fn message_count_attributes(&self, queue_url: &str) -> Result<Vec<String>>;
}

/// Probe summing approximate visible + not-visible message counts
/// across the configured queues
pub struct SqsProbe {
    api: Arc<dyn SqsQueueApi>,
    queue_urls: Vec<String>,
}

impl std::fmt::Debug for SqsProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsProbe")
            .field("queue_urls", &self.queue_urls)
            .finish()
    }
}

impl SqsProbe {
    /// Create the probe against AWS, resolving each queue name to a URL
    pub async fn new(config: &SqsProbeConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_sqs::Client::new(&aws_config);

        Self::with_api(config, Arc::new(SdkQueueApi { client })).await
    }

    /// Create the probe over any queue API implementation
    async fn with_api(config: &SqsProbeConfig, api: Arc<dyn SqsQueueApi>) -> Result<Self> {
        if config.queues.is_empty() {
            return Err(AutoscalerError::Config(
                "sqs probe requires at least one queue".to_string(),
            ));
        }

        let mut queue_urls = Vec::with_capacity(config.queues.len());
        for queue in &config.queues {
            let url = api.resolve_queue_url(queue).await?;
            tracing::debug!(queue = %queue, url = %url, "resolved sqs queue url");
            queue_urls.push(url);
        }

        Ok(Self { api, queue_urls })
    }
}

#[async_trait]
impl Probe for SqsProbe {
    fn kind(&self) -> &'static str {
        "sqs"
    }

    async fn check(&self) -> Result<i64> {
        let mut total = 0i64;

        for url in &self.queue_urls {
            for value in self.api.message_count_attributes(url).await? {
                let count: i64 = value.parse().map_err(|_| {
                    AutoscalerError::Probe(format!(
                        "queue '{}' returned a non-numeric attribute: {}",
                        url, value
                    ))
                })?;
                total += count;
            }
        }

        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// SdkQueueApi — AWS SDK implementation
// ---------------------------------------------------------------------------

struct SdkQueueApi {
    client: aws_sdk_sqs::Client,
}

#[async_trait]
impl SqsQueueApi for SdkQueueApi {
    async fn resolve_queue_url(&self, queue: &str) -> Result<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue)
            .send()
            .await
            .map_err(|e| {
                AutoscalerError::Probe(format!(
                    "failed to resolve url for queue '{}': {}",
                    queue, e
                ))
            })?;

        let url = output.queue_url().ok_or_else(|| {
            AutoscalerError::Probe(format!("queue '{}' resolved to an empty url", queue))
        })?;

        Ok(url.to_string())
    }

    async fn message_count_attributes(&self, queue_url: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
            .map_err(|e| {
                AutoscalerError::Probe(format!(
                    "failed to read attributes of queue '{}': {}",
                    queue_url, e
                ))
            })?;

        Ok(output
            .attributes()
            .into_iter()
            .flat_map(|attributes| attributes.values())
            .cloned()
            .collect())
    }
}
