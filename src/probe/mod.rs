//! Load probes — pluggable sensors producing one integer sample per check
//!
//! A probe observes external, application-specific load: SQS queue depth,
//! Redis list length, or in-pod connection counters. Each scaler owns
//! exactly one probe instance and polls it once per tick.

pub mod nginx;
pub mod redis;
pub mod sqs;

use async_trait::async_trait;

use crate::error::Result;

/// A single load sensor. `check` returns one non-negative sample; the
/// caller bounds the call with a deadline and drops the future on
/// cancellation.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable short identifier used in notifications and logs
    fn kind(&self) -> &'static str;

    /// Take one load observation
    async fn check(&self) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// MockProbe — scripted samples for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) struct MockProbe {
    samples: std::sync::Mutex<std::collections::VecDeque<Result<i64>>>,
}

#[cfg(test)]
impl MockProbe {
    pub(crate) fn new(samples: Vec<Result<i64>>) -> Self {
        Self {
            samples: std::sync::Mutex::new(samples.into_iter().collect()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Probe for MockProbe {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn check(&self) -> Result<i64> {
        self.samples
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(crate::error::AutoscalerError::Probe(
                    "mock: no scripted samples left".to_string(),
                ))
            })
    }
}
