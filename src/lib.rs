//! # Autoscaler
//!
//! A probe-driven autoscaler for Kubernetes Deployments. One control
//! loop per managed workload samples an external load signal (SQS
//! queue depth, Redis list length, or in-pod connection counters)
//! and steps the Deployment's replica count toward the load, one
//! replica per tick.
//!
//! ## Architecture
//!
//! ```text
//! Supervisor → Controller (per workload) → Probe
//!                    │                      │
//!                    ├── Decision engine ◄──┘
//!                    ├── Cluster adapter (read / scale)
//!                    └── Notifiers (Slack webhook)
//! ```
//!
//! ## Behavior
//!
//! - **±1 step per tick**: convergence is iterative, never a jump.
//! - **Hourly bands**: min/max replica limits can vary by hour of day.
//! - **Scale-to-zero guard**: 1 → 0 requires five consecutive zero
//!   samples.
//! - **Health gate**: a workload mid-transition is never perturbed.
//! - **Cooldown**: scaling actions are rate-limited, except from zero.

pub mod cluster;
pub mod config;
pub mod error;
pub mod notification;
pub mod probe;
pub mod scaler;
pub mod stats;
pub mod supervisor;

// Re-export main types
pub use cluster::{ClusterClient, KubeClusterClient, PodInfo, WorkloadView};
pub use config::GlobalConfig;
pub use error::{AutoscalerError, Result};
pub use scaler::{decide, Controller, ControllerInput, Decision, ReplicaLimits, ScaleDirection, ScalerConfig};
pub use supervisor::{Supervisor, CONFIG_MAP_NAME};
