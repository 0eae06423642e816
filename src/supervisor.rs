//! Supervisor — builds and concurrently runs one scaler per configmap entry
//!
//! A bad entry is logged and skipped; it never prevents the other
//! workloads from being managed. Shutdown is a cancellation token: every
//! scaler runs under a child of the root token, so cancelling the root
//! aborts in-flight work everywhere, and the supervisor blocks until
//! every scaler task has finished.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cluster::ClusterClient;
use crate::config::GlobalConfig;
use crate::notification::Notifier;
use crate::scaler::{Controller, ControllerInput};

/// Name of the ConfigMap holding the per-workload configuration entries
pub const CONFIG_MAP_NAME: &str = "autoscaler-config";

/// Owns the scaler set for the life of the process
pub struct Supervisor {
    entries: BTreeMap<String, String>,
    cluster: Arc<dyn ClusterClient>,
    notifiers: Vec<Arc<dyn Notifier>>,
    global: GlobalConfig,
}

impl Supervisor {
    /// Create a supervisor over the configmap's `deployment → yaml` entries
    pub fn new(
        entries: BTreeMap<String, String>,
        cluster: Arc<dyn ClusterClient>,
        notifiers: Vec<Arc<dyn Notifier>>,
        global: GlobalConfig,
    ) -> Self {
        Self {
            entries,
            cluster,
            notifiers,
            global,
        }
    }

    /// Build and spawn every scaler, then block until all of them have
    /// drained after `shutdown` is cancelled. Returns how many scalers
    /// started.
    pub async fn run(self, shutdown: CancellationToken) -> usize {
        tracing::debug!(entries = self.entries.len(), "initializing scalers");

        let mut handles = Vec::new();

        for (deployment, raw_config) in self.entries {
            let input = ControllerInput {
                deployment_name: deployment.clone(),
                raw_config,
                cluster: self.cluster.clone(),
                notifiers: self.notifiers.clone(),
                global: self.global.clone(),
            };

            let span = tracing::info_span!("scaler", deployment = %deployment);

            let controller = match Controller::new(input).instrument(span.clone()).await {
                Ok(controller) => controller,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        deployment = %deployment,
                        "failed to initialize autoscaler, skipping"
                    );
                    continue;
                }
            };

            handles.push(tokio::spawn(
                controller.run(shutdown.child_token()).instrument(span),
            ));
        }

        let started = handles.len();
        tracing::info!(scalers = started, "scalers running");

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "scaler task failed");
            }
        }

        started
    }
}
