//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Limits and step sizes for a [`Scheduler`](crate::Scheduler).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on resumption passes within one tick. A tick that hits the
    /// limit logs a warning and leaves the remaining work for the next tick.
    pub max_passes_per_tick: usize,

    /// Tick size used by `seek` when replaying the scene.
    pub seek_step: f64,

    /// Unobserved task failures kept for `take_failures`; older ones are dropped.
    pub max_failures_retained: usize,

    /// Finished-task outcomes kept for `state`, `outcome` and `take_result`.
    /// The oldest unclaimed ones are dropped at the end of each tick.
    pub max_outcomes_retained: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_passes_per_tick: 10_000,
            seek_step: 1.0 / 60.0,
            max_failures_retained: 256,
            max_outcomes_retained: 4096,
        }
    }
}

impl Config {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn pass_limit(&self) -> usize {
        self.max_passes_per_tick.max(1)
    }

    pub(crate) fn effective_seek_step(&self) -> f64 {
        if self.seek_step > 0.0 && self.seek_step.is_finite() {
            self.seek_step
        } else {
            Self::default().seek_step
        }
    }
}
