//! Per-workload control loop
//!
//! One controller owns one workload: its probe, its sample history, and
//! its cooldown bookkeeping. Each tick runs a bounded unit of work
//! (probe, refresh, gate, decide, apply, notify); transient failures
//! never terminate the loop.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterClient, WorkloadView};
use crate::config::GlobalConfig;
use crate::error::{AutoscalerError, Result};
use crate::notification::{NotificationPayload, Notifier};
use crate::probe::nginx::NginxProbe;
use crate::probe::redis::RedisProbe;
use crate::probe::sqs::SqsProbe;
use crate::probe::Probe;
use crate::scaler::{decide, ScalerConfig};

/// Number of probe samples retained per workload
const RESULTS_TO_KEEP: usize = 10;

/// Deadline for one tick's unit of work
const TICK_DEADLINE: Duration = Duration::from_secs(10);

/// Wall-clock source, injectable so tests can pin time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// The process clock
pub fn system_clock() -> Clock {
    Arc::new(Local::now)
}

/// Everything needed to construct a controller
pub struct ControllerInput {
    /// Name of the Deployment to manage
    pub deployment_name: String,
    /// Raw YAML value from the configmap entry
    pub raw_config: String,
    /// Shared cluster client
    pub cluster: Arc<dyn ClusterClient>,
    /// Shared notification sinks
    pub notifiers: Vec<Arc<dyn Notifier>>,
    /// Process-level settings
    pub global: GlobalConfig,
}

/// Control loop for a single workload
pub struct Controller {
    deployment_name: String,
    config: ScalerConfig,
    probe: Arc<dyn Probe>,
    view: WorkloadView,
    history: Vec<i64>,
    last_action_at: Option<DateTime<Local>>,
    cluster: Arc<dyn ClusterClient>,
    notifiers: Vec<Arc<dyn Notifier>>,
    global: GlobalConfig,
    clock: Clock,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("deployment_name", &self.deployment_name)
            .field("config", &self.config)
            .field("view", &self.view)
            .field("history", &self.history)
            .field("last_action_at", &self.last_action_at)
            .field("global", &self.global)
            .finish()
    }
}

impl Controller {
    /// Build a controller: fetch the workload, decode its configuration,
    /// and construct exactly one probe. Any failure is fatal for this
    /// workload and the supervisor skips it.
    pub async fn new(input: ControllerInput) -> Result<Self> {
        Self::with_clock(input, system_clock()).await
    }

    /// Like [`Controller::new`] with an explicit clock
    pub async fn with_clock(input: ControllerInput, clock: Clock) -> Result<Self> {
        tracing::debug!("starting prefetch of deployment");
        let view = input.cluster.get_workload(&input.deployment_name).await?;
        tracing::debug!("finished fetching deployment");

        let config = ScalerConfig::from_yaml(&input.raw_config)?;
        tracing::debug!(config = ?config, "parsed autoscaler config");

        tracing::debug!("initializing probe");
        let probe = build_probe(&config, input.cluster.clone(), view.clone()).await?;
        tracing::debug!(kind = probe.kind(), "initialized probe");

        Ok(Self {
            deployment_name: input.deployment_name,
            config,
            probe,
            view,
            history: Vec::new(),
            last_action_at: None,
            cluster: input.cluster,
            notifiers: input.notifiers,
            global: input.global,
            clock,
        })
    }

    /// Run the control loop until `shutdown` is cancelled. Each tick's
    /// work is bounded by a fresh deadline and raced against the token,
    /// so cancellation drops in-flight probe, cluster, and notifier
    /// calls instead of waiting for the tick to finish.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let period = self.config.check_interval;
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("interval tick");
                    tokio::select! {
                        result = tokio::time::timeout(TICK_DEADLINE, self.perform()) => {
                            if result.is_err() {
                                tracing::warn!("tick exceeded deadline, skipping");
                            }
                        }
                        () = shutdown.cancelled() => {
                            tracing::debug!("shutting down scaler mid-tick");
                            return;
                        }
                    }
                }
                () = shutdown.cancelled() => {
                    tracing::debug!("shutting down scaler");
                    return;
                }
            }
        }
    }

    /// One tick: probe, record, refresh, gate, decide, apply, notify
    async fn perform(&mut self) {
        tracing::debug!("starting to evaluate autoscaling needs");

        let now = (self.clock)();

        let sample = match self.probe.check().await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(error = %e, "probe failed, skipping autoscaling");
                return;
            }
        };

        tracing::debug!(probe = self.probe.kind(), sample, "probe returned sample");
        self.history.push(sample);
        let excess = self.history.len().saturating_sub(RESULTS_TO_KEEP);
        if excess > 0 {
            self.history.drain(..excess);
        }
        tracing::debug!(history = ?self.history, "recent probe samples");

        match self.cluster.get_workload(&self.deployment_name).await {
            Ok(view) => self.view = view,
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh deployment");
                return;
            }
        }

        if self.view.reported_replicas != self.view.available_replicas {
            tracing::warn!("deployment available replicas not at target, won't adjust");
            return;
        }

        if self.in_cooldown(now) {
            tracing::debug!("autoscaler in cooldown, not making decision");
            return;
        }

        let limits = self.config.applicable_limits(now);
        let decision = decide(
            self.view.desired_replicas,
            sample,
            &self.history,
            limits,
            self.config.threshold,
        );
        tracing::info!("{}", decision);

        if !decision.is_remain() {
            if let Err(e) = self
                .cluster
                .scale_workload(&self.view, decision.target)
                .await
            {
                tracing::warn!(error = %e, "updating replication failed");
            }

            // Set even when the write failed, so a persistently failing
            // write is not retried every tick.
            self.last_action_at = Some(now);

            let payload = NotificationPayload {
                decision: decision.to_string(),
                last_probe_results: self.history.clone(),
                deployment: self.view.name.clone(),
                changed_at: now,
                source: self.probe.kind().to_string(),
                namespace: self.global.namespace.clone(),
                environment: self.global.environment.clone(),
            };

            for notifier in &self.notifiers {
                if let Err(e) = notifier.notify(&payload).await {
                    tracing::warn!(error = %e, sink = notifier.kind(), "failed to notify");
                }
            }
        }

        tracing::debug!("finished evaluating autoscaling needs");
    }

    /// Whether the cooldown gate blocks this tick. A fully drained
    /// workload (zero reported replicas) is exempt so a new load burst
    /// can re-scale it immediately.
    fn in_cooldown(&self, now: DateTime<Local>) -> bool {
        let Some(last_action_at) = self.last_action_at else {
            return false;
        };

        if self.view.reported_replicas == 0 {
            return false;
        }

        let cooldown = chrono::Duration::from_std(self.config.cooldown_period)
            .unwrap_or(chrono::TimeDelta::MAX);
        now.signed_duration_since(last_action_at) < cooldown
    }
}

/// Construct the probe selected by whichever section is present
async fn build_probe(
    config: &ScalerConfig,
    cluster: Arc<dyn ClusterClient>,
    view: WorkloadView,
) -> Result<Arc<dyn Probe>> {
    if let Some(sqs) = &config.sqs {
        return Ok(Arc::new(SqsProbe::new(sqs).await?));
    }

    if let Some(redis) = &config.redis {
        return Ok(Arc::new(RedisProbe::new(redis).await?));
    }

    if let Some(nginx) = &config.nginx {
        return Ok(Arc::new(NginxProbe::new(nginx, cluster, view)?));
    }

    Err(AutoscalerError::NoProbeConfigured)
}
