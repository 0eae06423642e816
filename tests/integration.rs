//! Integration tests for the autoscaler
//!
//! These tests spin up real TCP backends standing in for in-pod stats
//! endpoints and drive the public API end to end: config decode, probe
//! sampling, decision flow, and the controller loop.

use async_trait::async_trait;
use chrono::TimeZone;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use autoscaler::cluster::{ClusterClient, PodInfo, WorkloadView};
use autoscaler::config::GlobalConfig;
use autoscaler::notification::{NotificationPayload, Notifier};
use autoscaler::probe::nginx::{ConnectionStatsClient, NginxProbe, NginxProbeConfig};
use autoscaler::probe::Probe;
use autoscaler::scaler::{decide, Controller, ControllerInput, ScalerConfig};
use autoscaler::{AutoscalerError, Result};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a minimal HTTP backend that answers any request with the given
/// plain-text body. Returns the address it's listening on.
async fn spawn_stats_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// Cluster stub serving a fixed pod list and recording scale writes
struct StubCluster {
    view: Mutex<WorkloadView>,
    pods: Vec<PodInfo>,
    scale_calls: Mutex<Vec<(String, i32)>>,
}

impl StubCluster {
    fn new(view: WorkloadView, pods: Vec<PodInfo>) -> Self {
        Self {
            view: Mutex::new(view),
            pods,
            scale_calls: Mutex::new(Vec::new()),
        }
    }

    fn scale_calls(&self) -> Vec<(String, i32)> {
        self.scale_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for StubCluster {
    async fn get_workload(&self, _name: &str) -> Result<WorkloadView> {
        Ok(self.view.lock().unwrap().clone())
    }

    async fn list_workload_pods(
        &self,
        _view: &WorkloadView,
        _extra_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>> {
        Ok(self.pods.clone())
    }

    async fn scale_workload(&self, view: &WorkloadView, replicas: i32) -> Result<()> {
        self.scale_calls
            .lock()
            .unwrap()
            .push((view.name.clone(), replicas));
        self.view.lock().unwrap().desired_replicas = replicas;
        Ok(())
    }
}

/// Notifier stub counting deliveries
struct CountingNotifier {
    payloads: Mutex<Vec<NotificationPayload>>,
}

impl CountingNotifier {
    fn new() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    fn kind(&self) -> &'static str {
        "counting"
    }

    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn view(name: &str, desired: i32, reported: i32, available: i32) -> WorkloadView {
    WorkloadView {
        name: name.to_string(),
        desired_replicas: desired,
        reported_replicas: reported,
        available_replicas: available,
        selector_labels: BTreeMap::from([("app".to_string(), name.to_string())]),
    }
}

fn web_pod(name: &str, addr: SocketAddr) -> PodInfo {
    PodInfo {
        name: name.to_string(),
        // The probe builds http://<ip><endpoint>; host:port works here.
        ip: Some(addr.to_string()),
        running: true,
        ready: true,
    }
}

// ---------------------------------------------------------------------------
// Stats client against a live backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stats_client_reads_counter() {
    let addr = spawn_stats_backend("42\n").await;
    let client =
        ConnectionStatsClient::new("/stats/active_connections", std::time::Duration::from_secs(2))
            .unwrap();

    let connections = client.active_connections(&addr.to_string()).await.unwrap();
    assert_eq!(connections, 42);
}

#[tokio::test]
async fn test_stats_client_rejects_non_numeric_body() {
    let addr = spawn_stats_backend("not-a-number").await;
    let client =
        ConnectionStatsClient::new("/stats/active_connections", std::time::Duration::from_secs(2))
            .unwrap();

    let err = client
        .active_connections(&addr.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AutoscalerError::Probe(_)));
    assert!(err.to_string().contains("not a number"));
}

#[tokio::test]
async fn test_stats_client_unreachable_backend() {
    let client =
        ConnectionStatsClient::new("/stats", std::time::Duration::from_millis(200)).unwrap();
    assert!(client.active_connections("127.0.0.1:1").await.is_err());
}

// ---------------------------------------------------------------------------
// Nginx probe end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_nginx_probe_sums_across_pods() {
    let first = spawn_stats_backend("7").await;
    let second = spawn_stats_backend("5").await;

    let cluster = Arc::new(StubCluster::new(
        view("web", 2, 2, 2),
        vec![web_pod("web-1", first), web_pod("web-2", second)],
    ));

    let config = NginxProbeConfig {
        consecutive_reads: 1,
        ..NginxProbeConfig::default()
    };
    let probe = NginxProbe::new(&config, cluster, view("web", 2, 2, 2)).unwrap();

    assert_eq!(probe.kind(), "nginx");
    assert_eq!(probe.check().await.unwrap(), 12);
}

// ---------------------------------------------------------------------------
// Config decode → hourly resolution → decision
// ---------------------------------------------------------------------------

#[test]
fn test_decode_resolve_decide_flow() {
    let yaml = r#"
minimum_number_of_pods: 0
maximum_number_of_pods: 2
threshold: 20
hourly_config:
  - name: working-hours
    start_hour: 8
    end_hour: 17
    minimum_number_of_pods: 1
    maximum_number_of_pods: 5
nginx: {}
"#;
    let config = ScalerConfig::from_yaml(yaml).unwrap();

    // During working hours the override lifts the ceiling to 5.
    let working = chrono::Local.with_ymd_and_hms(2021, 5, 3, 11, 0, 0).unwrap();
    let limits = config.applicable_limits(working);
    let d = decide(4, 500, &[], limits, config.threshold);
    assert_eq!(d.to_string(), "scale up deployment from 4 to 5 replicas");

    // At night the default ceiling of 2 is already exceeded; remain.
    let night = chrono::Local.with_ymd_and_hms(2021, 5, 3, 4, 0, 0).unwrap();
    let limits = config.applicable_limits(night);
    let d = decide(4, 500, &[], limits, config.threshold);
    assert_eq!(d.to_string(), "remain at 4 replicas");
}

#[test]
fn test_decision_sequence_steps_down_one_at_a_time() {
    let config = ScalerConfig::from_yaml("threshold: 20\nnginx: {}\n").unwrap();
    let limits = config.applicable_limits(chrono::Local::now());

    // A burst left some non-zero samples behind; load is now zero.
    let mut history: Vec<i64> = vec![40, 25];
    let mut current = 3;

    // Replicas walk down one per tick; the final step to zero waits
    // until the last five samples are all zero.
    for tick in 0..7 {
        history.push(0);
        let d = decide(current, 0, &history, limits, config.threshold);
        current = d.target;

        match tick {
            0 => assert_eq!(current, 2),
            1 => assert_eq!(current, 1),
            // Guard holds at 1: the window still reaches back to the burst.
            2 | 3 => assert_eq!(current, 1),
            4 => assert_eq!(current, 0),
            _ => assert_eq!(current, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller loop end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_controller_scales_up_from_zero_under_load() {
    let backend = spawn_stats_backend("9").await;

    let cluster = Arc::new(StubCluster::new(
        view("web", 0, 0, 0),
        vec![web_pod("web-1", backend)],
    ));
    let notifier = Arc::new(CountingNotifier::new());

    let yaml = r#"
minimum_number_of_pods: 0
maximum_number_of_pods: 10
check_interval: 50ms
cooldown_period: 5m
threshold: 1
nginx:
  consecutive_reads: 1
  timeout: 10ms
"#;

    let controller = Controller::new(ControllerInput {
        deployment_name: "web".to_string(),
        raw_config: yaml.to_string(),
        cluster: cluster.clone(),
        notifiers: vec![notifier.clone()],
        global: GlobalConfig {
            namespace: "staging".to_string(),
            environment: "stg".to_string(),
            ..GlobalConfig::default()
        },
    })
    .await
    .unwrap();

    let shutdown = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(controller.run(shutdown.clone()));

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    shutdown.cancel();
    handle.await.unwrap();

    // Reported replicas stay 0 in the stub, so the cooldown exemption
    // lets the controller step up on every tick.
    let calls = cluster.scale_calls();
    assert!(!calls.is_empty(), "expected at least one scale call");
    assert_eq!(calls[0], ("web".to_string(), 1));
    for window in calls.windows(2) {
        assert_eq!(window[1].1 - window[0].1, 1, "steps must be ±1");
    }

    let payloads = notifier.payloads.lock().unwrap();
    assert_eq!(payloads.len(), calls.len());
    assert_eq!(payloads[0].source, "nginx");
    assert_eq!(payloads[0].namespace, "staging");
}

#[tokio::test]
async fn test_controller_construction_fails_without_probe() {
    let cluster = Arc::new(StubCluster::new(view("web", 1, 1, 1), vec![]));

    let err = Controller::new(ControllerInput {
        deployment_name: "web".to_string(),
        raw_config: "threshold: 20\n".to_string(),
        cluster,
        notifiers: vec![],
        global: GlobalConfig::default(),
    })
    .await
    .unwrap_err();

    assert!(matches!(err, AutoscalerError::NoProbeConfigured));
}
