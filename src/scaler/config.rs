//! Per-workload configuration — decoded from one configmap entry
//!
//! Defaults are seeded before decoding, so a minimal document is a valid
//! configuration. The hourly resolver selects the replica band active at
//! a given wall-clock instant; time is passed in so it stays pure.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AutoscalerError, Result};
use crate::probe::nginx::NginxProbeConfig;
use crate::probe::redis::RedisProbeConfig;
use crate::probe::sqs::SqsProbeConfig;

/// A replica band the scaler must stay within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaLimits {
    /// Minimum number of replicas (default: 0, enables scale-to-zero)
    #[serde(default)]
    pub minimum_number_of_pods: i32,

    /// Maximum number of replicas (default: 3)
    #[serde(default = "default_maximum_number_of_pods")]
    pub maximum_number_of_pods: i32,
}

impl Default for ReplicaLimits {
    fn default() -> Self {
        Self {
            minimum_number_of_pods: 0,
            maximum_number_of_pods: default_maximum_number_of_pods(),
        }
    }
}

/// A replica band overriding the default during a daily hour range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyLimits {
    /// Band applied while this override is active
    #[serde(flatten)]
    pub limits: ReplicaLimits,

    /// Override name, used in logs
    pub name: String,

    /// First hour (0..24) the override applies to
    pub start_hour: u32,

    /// First hour the override no longer applies to (half-open)
    pub end_hour: u32,
}

/// Per-workload scaler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Default replica band, used outside any hourly override
    #[serde(flatten)]
    pub default_limits: ReplicaLimits,

    /// Period between scaling checks (default: 1m)
    #[serde(default = "default_check_interval", with = "humantime_serde")]
    pub check_interval: Duration,

    /// Minimum gap between two scaling actions (default: 5m)
    #[serde(default = "default_cooldown_period", with = "humantime_serde")]
    pub cooldown_period: Duration,

    /// Divisor translating a probe sample into desired replicas
    #[serde(default)]
    pub threshold: i64,

    /// Ordered hourly overrides; first match wins
    #[serde(default)]
    pub hourly_config: Vec<HourlyLimits>,

    /// Queue-depth probe section
    #[serde(default)]
    pub sqs: Option<SqsProbeConfig>,

    /// List-length probe section
    #[serde(default)]
    pub redis: Option<RedisProbeConfig>,

    /// In-pod counter probe section
    #[serde(default)]
    pub nginx: Option<NginxProbeConfig>,
}

fn default_maximum_number_of_pods() -> i32 {
    3
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_cooldown_period() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            default_limits: ReplicaLimits::default(),
            check_interval: default_check_interval(),
            cooldown_period: default_cooldown_period(),
            threshold: 0,
            hourly_config: Vec::new(),
            sqs: None,
            redis: None,
            nginx: None,
        }
    }
}

impl ScalerConfig {
    /// Decode one configmap entry. A missing probe section is not an
    /// error here; it surfaces when the probe is built.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| AutoscalerError::Config(format!("invalid scaler config: {}", e)))
    }

    /// Replica band active at `now`: the first hourly override covering
    /// the hour of day, or the default band.
    pub fn applicable_limits(&self, now: DateTime<Local>) -> ReplicaLimits {
        if self.hourly_config.is_empty() {
            tracing::debug!("no hourly configs defined, applying default limits");
            return self.default_limits;
        }

        let hour = now.hour();

        for hourly in &self.hourly_config {
            if hourly.start_hour <= hour && hour < hourly.end_hour {
                tracing::debug!(name = %hourly.name, "applying hourly limits");
                return hourly.limits;
            }
        }

        tracing::debug!("no hourly config applicable, falling back to default limits");
        self.default_limits
    }
}
