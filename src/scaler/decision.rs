//! Decision engine — pure mapping from observations to a scaling step
//!
//! The step size is capped at ±1 per tick; convergence toward the
//! desired replica count is iterative. Crossing from one replica to
//! zero additionally requires the recent probe history to be all zeros.

use serde::{Deserialize, Serialize};

use crate::scaler::ReplicaLimits;

/// Number of trailing zero samples required before scaling to zero
const CONSECUTIVE_ZEROS_TO_REACH_ZERO: usize = 5;

/// Direction of a scaling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleDirection {
    Up,
    Down,
    Remain,
}

/// A scaling decision for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Direction of the step
    pub direction: ScaleDirection,
    /// Replica count the decision was made against
    pub current: i32,
    /// Replica count to move to; equals `current` for Remain
    pub target: i32,
}

impl Decision {
    fn remain(current: i32) -> Self {
        Self {
            direction: ScaleDirection::Remain,
            current,
            target: current,
        }
    }

    /// Whether this decision leaves the workload untouched
    pub fn is_remain(&self) -> bool {
        self.direction == ScaleDirection::Remain
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            ScaleDirection::Up => write!(
                f,
                "scale up deployment from {} to {} replicas",
                self.current, self.target
            ),
            ScaleDirection::Down => write!(
                f,
                "scale down deployment from {} to {} replicas",
                self.current, self.target
            ),
            ScaleDirection::Remain => write!(f, "remain at {} replicas", self.current),
        }
    }
}

/// Decide the next scaling step.
///
/// `desired = ceil(sample / threshold)` is compared against `current`;
/// the result is a single step toward it, clamped by `limits`. History
/// feeds only the scale-to-zero guard: the last five samples must all
/// be zero (and present) before 1 → 0 is allowed.
pub fn decide(
    current: i32,
    sample: i64,
    history: &[i64],
    limits: ReplicaLimits,
    threshold: i64,
) -> Decision {
    let desired = (sample as f64 / threshold as f64).ceil() as i64;

    tracing::debug!(current, desired, "comparing current and desired replica counts");

    if i64::from(current) == desired {
        tracing::debug!("current replicas same as desired, deployment remains the same");
        return Decision::remain(current);
    }

    if i64::from(current) < desired {
        if current + 1 <= limits.maximum_number_of_pods {
            tracing::debug!("scale up available, decided to scale up");
            return Decision {
                direction: ScaleDirection::Up,
                current,
                target: current + 1,
            };
        }
        tracing::debug!("scale up unavailable, reached maximum number of pods");
        return Decision::remain(current);
    }

    // current > desired
    if current - 1 < limits.minimum_number_of_pods {
        tracing::debug!("scale down unavailable, reached minimum number of pods");
        return Decision::remain(current);
    }

    if current - 1 == 0 && !only_zeros(last_n(history, CONSECUTIVE_ZEROS_TO_REACH_ZERO)) {
        tracing::debug!("scaling down to zero unavailable, no consecutive zero reads");
        return Decision::remain(current);
    }

    tracing::debug!("scale down available, decided to scale down");
    Decision {
        direction: ScaleDirection::Down,
        current,
        target: current - 1,
    }
}

/// The trailing `count` elements of `values`
fn last_n(values: &[i64], count: usize) -> &[i64] {
    &values[values.len().saturating_sub(count)..]
}

/// Whether `values` is non-empty and every element is zero
fn only_zeros(values: &[i64]) -> bool {
    !values.is_empty() && values.iter().all(|v| *v == 0)
}
