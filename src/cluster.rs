//! Cluster adapter — read/list/scale operations against Kubernetes
//!
//! `ClusterClient` is the narrow capability the scalers consume;
//! `KubeClusterClient` implements it over the Kubernetes API for a single
//! namespace. A mock implementation for tests lives at the bottom.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{AutoscalerError, Result};

/// Snapshot of a managed Deployment, immutable per fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadView {
    /// Deployment name
    pub name: String,
    /// Replica count requested in the spec
    pub desired_replicas: i32,
    /// Replica count currently reported by the controller
    pub reported_replicas: i32,
    /// Replica count currently available to serve traffic
    pub available_replicas: i32,
    /// Label selector matching the workload's pods
    pub selector_labels: BTreeMap<String, String>,
}

/// Pod facts the probes care about, distilled from the pod status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    /// Pod name
    pub name: String,
    /// Pod IP, if assigned
    pub ip: Option<String>,
    /// Whether the pod phase is Running
    pub running: bool,
    /// Whether no pod condition reports False
    pub ready: bool,
}

/// Async capability for workload reads and replica writes
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a fresh snapshot of the named workload
    async fn get_workload(&self, name: &str) -> Result<WorkloadView>;

    /// List the workload's pods, narrowing the selector with `extra_labels`
    async fn list_workload_pods(
        &self,
        view: &WorkloadView,
        extra_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>>;

    /// Set the workload's desired replica count. Idempotent.
    async fn scale_workload(&self, view: &WorkloadView, replicas: i32) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KubeClusterClient — Kubernetes implementation
// ---------------------------------------------------------------------------

/// Kubernetes-backed cluster client scoped to one namespace
pub struct KubeClusterClient {
    client: kube::Client,
    namespace: String,
}

impl KubeClusterClient {
    /// Create a client from the ambient kubeconfig or in-cluster environment
    pub async fn new(namespace: impl Into<String>) -> Result<Self> {
        let client = kube::Client::try_default().await.map_err(|e| {
            AutoscalerError::Cluster(format!("failed to create Kubernetes client: {}", e))
        })?;
        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    /// Read a ConfigMap's data section
    pub async fn get_config_map(&self, name: &str) -> Result<BTreeMap<String, String>> {
        use k8s_openapi::api::core::v1::ConfigMap;
        use kube::api::Api;

        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let cm = api.get(name).await.map_err(|e| {
            AutoscalerError::Cluster(format!("failed to get configmap '{}': {}", name, e))
        })?;

        Ok(cm.data.unwrap_or_default())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_workload(&self, name: &str) -> Result<WorkloadView> {
        use k8s_openapi::api::apps::v1::Deployment;
        use kube::api::Api;

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let deploy = api.get(name).await.map_err(|e| {
            AutoscalerError::Cluster(format!("failed to get deployment '{}': {}", name, e))
        })?;

        let status = deploy.status.as_ref();

        Ok(WorkloadView {
            name: name.to_string(),
            desired_replicas: deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
            reported_replicas: status.and_then(|s| s.replicas).unwrap_or(0),
            available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
            selector_labels: deploy
                .spec
                .map(|s| s.selector.match_labels.unwrap_or_default())
                .unwrap_or_default(),
        })
    }

    async fn list_workload_pods(
        &self,
        view: &WorkloadView,
        extra_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>> {
        use k8s_openapi::api::core::v1::Pod;
        use kube::api::{Api, ListParams};

        let mut selector = view.selector_labels.clone();
        for (label, value) in extra_labels {
            selector.insert(label.clone(), value.clone());
        }
        let selector = selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let pods = api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| {
                AutoscalerError::Cluster(format!(
                    "failed to list pods for deployment '{}': {}",
                    view.name, e
                ))
            })?;

        Ok(pods.items.iter().map(pod_info).collect())
    }

    async fn scale_workload(&self, view: &WorkloadView, replicas: i32) -> Result<()> {
        use k8s_openapi::api::apps::v1::Deployment;
        use kube::api::{Api, Patch, PatchParams};

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);

        let patch = serde_json::json!({
            "spec": {
                "replicas": replicas
            }
        });

        api.patch(
            &view.name,
            &PatchParams::apply("autoscaler"),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| {
            AutoscalerError::Cluster(format!(
                "failed to scale deployment '{}': {}",
                view.name, e
            ))
        })?;

        Ok(())
    }
}

/// Distill the probe-relevant facts out of a pod's status
fn pod_info(pod: &k8s_openapi::api::core::v1::Pod) -> PodInfo {
    let status = pod.status.as_ref();

    let running = status.and_then(|s| s.phase.as_deref()) == Some("Running");
    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| conditions.iter().all(|c| c.status != "False"))
        .unwrap_or(true);

    PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        ip: status.and_then(|s| s.pod_ip.clone()),
        running,
        ready,
    }
}

// ---------------------------------------------------------------------------
// MockClusterClient — records calls for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) struct MockClusterClient {
    view: std::sync::Mutex<WorkloadView>,
    pods: std::sync::Mutex<Vec<PodInfo>>,
    scale_calls: std::sync::Mutex<Vec<(String, i32)>>,
    fail_get: std::sync::atomic::AtomicBool,
    fail_scale: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockClusterClient {
    pub(crate) fn new(view: WorkloadView) -> Self {
        Self {
            view: std::sync::Mutex::new(view),
            pods: std::sync::Mutex::new(Vec::new()),
            scale_calls: std::sync::Mutex::new(Vec::new()),
            fail_get: std::sync::atomic::AtomicBool::new(false),
            fail_scale: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub(crate) fn set_view(&self, view: WorkloadView) {
        *self.view.lock().unwrap() = view;
    }

    pub(crate) fn set_pods(&self, pods: Vec<PodInfo>) {
        *self.pods.lock().unwrap() = pods;
    }

    pub(crate) fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn set_fail_scale(&self, fail: bool) {
        self.fail_scale
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn scale_calls(&self) -> Vec<(String, i32)> {
        self.scale_calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn get_workload(&self, name: &str) -> Result<WorkloadView> {
        if self.fail_get.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AutoscalerError::Cluster(format!(
                "mock: failed to get deployment '{}'",
                name
            )));
        }
        Ok(self.view.lock().unwrap().clone())
    }

    async fn list_workload_pods(
        &self,
        _view: &WorkloadView,
        _extra_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>> {
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn scale_workload(&self, view: &WorkloadView, replicas: i32) -> Result<()> {
        self.scale_calls
            .lock()
            .unwrap()
            .push((view.name.clone(), replicas));
        if self.fail_scale.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AutoscalerError::Cluster(format!(
                "mock: failed to scale deployment '{}'",
                view.name
            )));
        }
        self.view.lock().unwrap().desired_replicas = replicas;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with_status(name: &str, phase: &str, conditions: Vec<(&str, &str)>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                pod_ip: Some("10.0.0.5".to_string()),
                conditions: Some(
                    conditions
                        .into_iter()
                        .map(|(type_, status)| PodCondition {
                            type_: type_.to_string(),
                            status: status.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn view(name: &str) -> WorkloadView {
        WorkloadView {
            name: name.to_string(),
            desired_replicas: 2,
            reported_replicas: 2,
            available_replicas: 2,
            selector_labels: BTreeMap::from([("app".to_string(), name.to_string())]),
        }
    }

    #[test]
    fn test_pod_info_running_and_ready() {
        let pod = pod_with_status("web-1", "Running", vec![("Ready", "True")]);
        let info = pod_info(&pod);
        assert_eq!(info.name, "web-1");
        assert_eq!(info.ip.as_deref(), Some("10.0.0.5"));
        assert!(info.running);
        assert!(info.ready);
    }

    #[test]
    fn test_pod_info_pending_not_running() {
        let pod = pod_with_status("web-1", "Pending", vec![("Ready", "True")]);
        assert!(!pod_info(&pod).running);
    }

    #[test]
    fn test_pod_info_false_condition_not_ready() {
        let pod = pod_with_status(
            "web-1",
            "Running",
            vec![("Initialized", "True"), ("Ready", "False")],
        );
        let info = pod_info(&pod);
        assert!(info.running);
        assert!(!info.ready);
    }

    #[test]
    fn test_pod_info_no_conditions_is_ready() {
        let pod = pod_with_status("web-1", "Running", vec![]);
        assert!(pod_info(&pod).ready);
    }

    #[tokio::test]
    async fn test_mock_returns_view() {
        let mock = MockClusterClient::new(view("api"));
        let fetched = mock.get_workload("api").await.unwrap();
        assert_eq!(fetched.name, "api");
        assert_eq!(fetched.desired_replicas, 2);
    }

    #[tokio::test]
    async fn test_mock_get_failure() {
        let mock = MockClusterClient::new(view("api"));
        mock.set_fail_get(true);
        assert!(mock.get_workload("api").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_scale_records_and_updates_view() {
        let mock = MockClusterClient::new(view("api"));
        let v = mock.get_workload("api").await.unwrap();
        mock.scale_workload(&v, 3).await.unwrap();

        assert_eq!(mock.scale_calls(), vec![("api".to_string(), 3)]);
        assert_eq!(mock.get_workload("api").await.unwrap().desired_replicas, 3);
    }

    #[tokio::test]
    async fn test_mock_scale_failure_still_recorded() {
        let mock = MockClusterClient::new(view("api"));
        mock.set_fail_scale(true);
        let v = mock.get_workload("api").await.unwrap();
        assert!(mock.scale_workload(&v, 3).await.is_err());
        assert_eq!(mock.scale_calls().len(), 1);
    }
}
