//! Process-level settings captured once from command-line flags

/// Settings shared by every scaler in the process. Built from flags at
/// startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    /// Environment name reported in logs and notifications
    pub environment: String,
    /// Namespace the autoscaler operates within
    pub namespace: String,
    /// Slack incoming-webhook URL; empty disables the sink
    pub slack_webhook_url: String,
    /// Slack channel override for notifications
    pub slack_channel: String,
    /// Cluster name reported in notifications
    pub cluster_name: String,
}
