//! Error types for the cadence runtime

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, TaskId};

/// Errors raised by signals, computed values and the scheduler.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A duration or time argument was negative or NaN
    #[error("Invalid duration for {operation}: {seconds}s (must be >= 0)")]
    InvalidDuration { operation: String, seconds: f64 },

    /// A computed value re-entered its own evaluation
    #[error("Cyclic dependency: {label} ({node}) was read while it was being evaluated")]
    CyclicDependency { node: NodeId, label: String },

    /// A task step returned an error or panicked
    #[error("Task {label} ({task}) failed: {message}")]
    TaskFailure {
        task: TaskId,
        label: String,
        message: String,
    },

    /// A task was still waiting on something that will never arrive when the
    /// scheduler was disposed
    #[error("Task {label} ({task}) still waiting on {waiting_on} at disposal")]
    DanglingSuspension {
        task: TaskId,
        label: String,
        waiting_on: String,
    },

    /// Write to a signal after it was disposed
    #[error("Write to disposed signal {label} ({signal})")]
    UnresolvedWrite { signal: NodeId, label: String },

    /// Host call naming a task that is not live
    #[error("Unknown task: {task}")]
    UnknownTask { task: TaskId },
}

impl RuntimeError {
    pub(crate) fn invalid_duration(operation: &str, seconds: f64) -> Self {
        Self::InvalidDuration {
            operation: operation.to_string(),
            seconds,
        }
    }

    /// Check if this is a recoverable error
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TaskFailure { .. } | Self::DanglingSuspension { .. } | Self::UnknownTask { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidDuration { .. } => "validation",
            Self::CyclicDependency { .. } => "dependency",
            Self::TaskFailure { .. } | Self::UnknownTask { .. } => "task",
            Self::DanglingSuspension { .. } | Self::UnresolvedWrite { .. } => "lifecycle",
        }
    }
}

/// Reject negative and NaN durations.
pub(crate) fn check_duration(operation: &str, seconds: f64) -> Result<(), RuntimeError> {
    if seconds >= 0.0 {
        Ok(())
    } else {
        Err(RuntimeError::invalid_duration(operation, seconds))
    }
}
