//! In-pod connection-counter probe
//!
//! Enumerates the workload's `type=web` pods, requires every pod to be
//! running and ready, then performs several rounds of parallel per-pod
//! HTTP reads of a plain-integer connection counter. Round totals are
//! reduced to one sample via a configurable statistic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::{ClusterClient, PodInfo, WorkloadView};
use crate::error::{AutoscalerError, Result};
use crate::probe::Probe;
use crate::stats;

/// Reduction applied to the per-round connection totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Mean of the round totals, rounded up
    Average,
    /// Median of the round totals, rounded up
    Median,
    /// Largest round total
    #[default]
    Maximum,
}

/// `nginx` section of a workload's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NginxProbeConfig {
    /// Relative URL of the connection counter on each pod
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Statistic reducing round totals to one sample
    #[serde(default)]
    pub statistic: Statistic,

    /// Number of read rounds per check
    #[serde(default = "default_consecutive_reads")]
    pub consecutive_reads: u32,

    /// Pause between consecutive read rounds
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Per-request timeout for a single pod fetch
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_endpoint() -> String {
    "/stats/active_connections".to_string()
}

fn default_consecutive_reads() -> u32 {
    3
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for NginxProbeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            statistic: Statistic::default(),
            consecutive_reads: default_consecutive_reads(),
            timeout: default_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Pods must carry this label on top of the workload selector to be probed
fn web_pod_labels() -> BTreeMap<String, String> {
    BTreeMap::from([("type".to_string(), "web".to_string())])
}

/// Probe reading in-pod connection counters over HTTP
pub struct NginxProbe {
    cluster: Arc<dyn ClusterClient>,
    view: WorkloadView,
    stats_client: ConnectionStatsClient,
    statistic: Statistic,
    consecutive_reads: u32,
    pause: Duration,
}

impl NginxProbe {
    /// Create the probe for a workload snapshot taken at scaler construction
    pub fn new(
        config: &NginxProbeConfig,
        cluster: Arc<dyn ClusterClient>,
        view: WorkloadView,
    ) -> Result<Self> {
        // Zero or empty values mean "unset" and fall back to defaults.
        let endpoint = if config.endpoint.is_empty() {
            default_endpoint()
        } else {
            config.endpoint.clone()
        };
        let consecutive_reads = if config.consecutive_reads == 0 {
            default_consecutive_reads()
        } else {
            config.consecutive_reads
        };
        let pause = if config.timeout.is_zero() {
            default_timeout()
        } else {
            config.timeout
        };
        let request_timeout = if config.request_timeout.is_zero() {
            default_request_timeout()
        } else {
            config.request_timeout
        };

        let stats_client = ConnectionStatsClient::new(&endpoint, request_timeout)?;

        Ok(Self {
            cluster,
            view,
            stats_client,
            statistic: config.statistic,
            consecutive_reads,
            pause,
        })
    }

    /// Fetch the counter from every pod in parallel, one value per pod
    async fn fetch_round(&self, pods: &[PodInfo]) -> Result<Vec<i64>> {
        let fetches = pods.iter().map(|pod| async move {
            let ip = pod.ip.as_deref().ok_or_else(|| {
                AutoscalerError::Probe(format!("pod '{}' has no ip assigned", pod.name))
            })?;

            let connections = self.stats_client.active_connections(ip).await?;
            tracing::debug!(pod = %pod.name, connections, "fetched active connections from pod");

            Ok::<i64, AutoscalerError>(connections)
        });

        futures::future::try_join_all(fetches).await
    }
}

#[async_trait]
impl Probe for NginxProbe {
    fn kind(&self) -> &'static str {
        "nginx"
    }

    async fn check(&self) -> Result<i64> {
        let pods = self
            .cluster
            .list_workload_pods(&self.view, &web_pod_labels())
            .await?;

        tracing::debug!(pods = pods.len(), "found web pods for workload");

        if pods.iter().any(|pod| !pod.running || !pod.ready) {
            return Err(AutoscalerError::Probe(
                "workload pods are not fully operational".to_string(),
            ));
        }

        let mut round_totals = Vec::with_capacity(self.consecutive_reads as usize);
        for round in 0..self.consecutive_reads {
            let per_pod = self.fetch_round(&pods).await?;
            round_totals.push(per_pod.iter().sum());

            if round + 1 < self.consecutive_reads {
                tokio::time::sleep(self.pause).await;
            }
        }

        tracing::debug!(rounds = ?round_totals, "gathered connection totals");

        Ok(reduce_rounds(self.statistic, &round_totals))
    }
}

/// Reduce per-round connection totals to a single sample
fn reduce_rounds(statistic: Statistic, rounds: &[i64]) -> i64 {
    match statistic {
        Statistic::Average => stats::mean(rounds).ceil() as i64,
        Statistic::Median => {
            let mut sorted = rounds.to_vec();
            stats::median(&mut sorted).ceil() as i64
        }
        Statistic::Maximum => stats::maximum(rounds),
    }
}

// ---------------------------------------------------------------------------
// ConnectionStatsClient — per-pod HTTP counter reads
// ---------------------------------------------------------------------------

/// HTTP client fetching a plain-integer counter from a pod IP
pub struct ConnectionStatsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ConnectionStatsClient {
    /// Create a client for the given relative endpoint
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        let endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };

        Ok(Self { client, endpoint })
    }

    /// Read the current counter value from one pod
    pub async fn active_connections(&self, ip: &str) -> Result<i64> {
        let url = format!("http://{}{}", ip, self.endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AutoscalerError::Probe(format!("failed to get {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AutoscalerError::Probe(format!(
                "expected 200 response from {}, got {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            AutoscalerError::Probe(format!("failed to read response body from {}: {}", url, e))
        })?;

        body.trim().parse().map_err(|_| {
            AutoscalerError::Probe(format!(
                "returned active connections is not a number: {}",
                body.trim()
            ))
        })
    }
}
