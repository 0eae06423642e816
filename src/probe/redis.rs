//! List-length probe — sums LLEN across a set of Redis hosts
//!
//! Construction connects to and pings every configured host so an
//! unreachable instance fails the scaler at startup. A check sums the
//! length of every configured list key on every host.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};

use crate::error::{AutoscalerError, Result};
use crate::probe::Probe;

/// `redis` section of a workload's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisProbeConfig {
    /// `host:port` addresses of the Redis instances
    #[serde(default)]
    pub hosts: Vec<String>,
    /// List keys whose lengths are summed into one sample
    #[serde(default)]
    pub list_keys: Vec<String>,
}

/// Probe summing list lengths across every host for every key
pub struct RedisProbe {
    connections: Vec<(String, MultiplexedConnection)>,
    list_keys: Vec<String>,
}

impl std::fmt::Debug for RedisProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisProbe")
            .field(
                "hosts",
                &self.connections.iter().map(|(h, _)| h).collect::<Vec<_>>(),
            )
            .field("list_keys", &self.list_keys)
            .finish()
    }
}

impl RedisProbe {
    /// Create the probe, connecting to and pinging every host
    pub async fn new(config: &RedisProbeConfig) -> Result<Self> {
        if config.hosts.is_empty() {
            return Err(AutoscalerError::Config(
                "redis probe hosts list cannot be empty".to_string(),
            ));
        }

        if config.list_keys.is_empty() {
            return Err(AutoscalerError::Config(
                "redis probe list keys cannot be empty".to_string(),
            ));
        }

        let mut connections = Vec::with_capacity(config.hosts.len());
        for host in &config.hosts {
            let url = format!("redis://{}", host);
            let client = redis::Client::open(url.as_str())?;
            let mut connection = client.get_multiplexed_async_connection().await.map_err(
                |e| {
                    AutoscalerError::Probe(format!(
                        "failed to connect to redis instance '{}': {}",
                        host, e
                    ))
                },
            )?;

            let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
            tracing::debug!(host = %host, result = %pong, "connected to redis instance");

            connections.push((host.clone(), connection));
        }

        Ok(Self {
            connections,
            list_keys: config.list_keys.clone(),
        })
    }
}

#[async_trait]
impl Probe for RedisProbe {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<i64> {
        let mut total = 0i64;

        for key in &self.list_keys {
            for (host, connection) in &self.connections {
                let length: i64 = redis::cmd("LLEN")
                    .arg(key)
                    .query_async(&mut connection.clone())
                    .await
                    .map_err(|e| {
                        AutoscalerError::Probe(format!(
                            "failed to read list '{}' on '{}': {}",
                            key, host, e
                        ))
                    })?;

                total += length;
            }
        }

        Ok(total)
    }
}
