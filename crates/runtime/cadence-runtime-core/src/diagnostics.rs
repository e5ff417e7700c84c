use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Summary of one scheduler tick. Activity triggered between ticks (host
/// spawns, dispatches, cancels) is folded into the following report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub epoch: u64,
    pub dt: f64,
    /// Clock time after the tick.
    pub time: f64,
    pub passes: usize,
    /// Task steps executed.
    pub resumed: usize,
    pub spawned: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failures: Vec<RuntimeError>,
    /// Live tasks after the tick.
    pub pending: usize,
    pub pass_limit_hit: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TickStats {
    pub passes: usize,
    pub resumed: usize,
    pub spawned: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failures: Vec<RuntimeError>,
    pub pass_limit_hit: bool,
}

impl TickStats {
    pub fn take_report(&mut self, epoch: u64, dt: f64, time: f64, pending: usize) -> TickReport {
        let stats = std::mem::take(self);
        TickReport {
            epoch,
            dt,
            time,
            passes: stats.passes,
            resumed: stats.resumed,
            spawned: stats.spawned,
            completed: stats.completed,
            cancelled: stats.cancelled,
            failures: stats.failures,
            pending,
            pass_limit_hit: stats.pass_limit_hit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taking_a_report_resets_counters() {
        let mut stats = TickStats {
            passes: 2,
            resumed: 3,
            spawned: 1,
            ..TickStats::default()
        };
        let report = stats.take_report(4, 0.5, 2.0, 1);
        assert_eq!(report.epoch, 4);
        assert_eq!(report.resumed, 3);
        assert_eq!(report.pending, 1);
        assert_eq!(stats.passes, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["spawned"], 1);
        assert_eq!(json["time"], 2.0);
    }
}
