//! Notification sinks — deliver scaling decisions to external channels
//!
//! Delivery is synchronous and sequential within a tick; a failing sink
//! is logged and never blocks the loop or the remaining sinks.

pub mod slack;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::Result;

/// What happened, for whom, and the evidence behind it
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// Rendered decision text
    pub decision: String,
    /// Recent probe samples, most recent last
    pub last_probe_results: Vec<i64>,
    /// Deployment the decision applies to
    pub deployment: String,
    /// When the decision was applied
    pub changed_at: DateTime<Local>,
    /// Probe kind that produced the samples
    pub source: String,
    /// Namespace the autoscaler runs in
    pub namespace: String,
    /// Environment name
    pub environment: String,
}

/// A delivery channel for scaling decisions
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable short identifier used in logs
    fn kind(&self) -> &'static str;

    /// Deliver one payload
    async fn notify(&self, payload: &NotificationPayload) -> Result<()>;
}

// ---------------------------------------------------------------------------
// RecordingNotifier — captures payloads for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) struct RecordingNotifier {
    payloads: std::sync::Mutex<Vec<NotificationPayload>>,
    fail: bool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            payloads: std::sync::Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            payloads: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn payloads(&self) -> Vec<NotificationPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    fn kind(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        if self.fail {
            return Err(crate::error::AutoscalerError::Notification(
                "recording notifier configured to fail".to_string(),
            ));
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
