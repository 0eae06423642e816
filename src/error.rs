//! Centralized error types for the autoscaler

use thiserror::Error;

/// Autoscaler error types
#[derive(Debug, Error)]
pub enum AutoscalerError {
    /// Per-workload configuration parsing or validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// No probe section present in a workload's configuration
    #[error("no probe configured for autoscaler")]
    NoProbeConfigured,

    /// Probe sampling failed (I/O, timeout, unhealthy pods)
    #[error("Probe error: {0}")]
    Probe(String),

    /// Cluster API read or write failed
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// Notification sink delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// HTTP request or response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Redis command or connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, AutoscalerError>;
