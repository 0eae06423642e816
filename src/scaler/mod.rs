//! Per-workload scaling — configuration, decision engine, and control loop

mod config;
mod controller;
mod decision;

pub use config::{HourlyLimits, ReplicaLimits, ScalerConfig};
pub use controller::{Clock, Controller, ControllerInput, system_clock};
pub use decision::{decide, Decision, ScaleDirection};
