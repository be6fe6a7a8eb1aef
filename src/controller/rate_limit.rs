//! # Brake Rate Limiting
//!
//! Keeps the price brake from jumping between cycles. Each cycle the brake
//! level may move at most `max_delta_per_step` away from the level emitted
//! in the previous cycle, in either direction.

use serde::{Deserialize, Serialize};

/// Outcome of a single limiting step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimited {
    pub value: f64,
    /// The requested value was further away than the allowed step
    pub limited: bool,
}

/// Symmetric per-step limiter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimiter {
    max_delta_per_step: f64,
}

impl RateLimiter {
    pub fn new(max_delta_per_step: f64) -> Self {
        Self {
            max_delta_per_step: max_delta_per_step.abs(),
        }
    }

    /// Move from `last` towards `desired` by at most one step.
    ///
    /// Without a previous value the desired value passes through unchanged.
    pub fn apply(&self, desired: f64, last: Option<f64>) -> RateLimited {
        let Some(last) = last else {
            return RateLimited {
                value: desired,
                limited: false,
            };
        };

        let delta = desired - last;
        if delta.abs() <= self.max_delta_per_step {
            return RateLimited {
                value: desired,
                limited: false,
            };
        }

        RateLimited {
            value: last + self.max_delta_per_step * delta.signum(),
            limited: true,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(0.08)
    }
}
