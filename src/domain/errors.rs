//! Domain errors for the homeostat control loop.
//!
//! None of these are allowed to terminate the control loop. Cycle-level
//! failures are converted into [`RecordedError`]s and attached to the
//! cycle's result; only API misuse (unknown ids, reentrant cycles, invalid
//! configuration) is returned to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the controller and its engines.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    #[error("Execution of '{activity}' failed: {reason}")]
    TransientExecution { activity: String, reason: String },

    #[error("Stability warning: {0}")]
    StabilityWarning(String),

    #[error("Circuit breaker tripped: drawdown {drawdown:.3} exceeds {max_drawdown:.3}")]
    CircuitBreakerTripped { drawdown: f64, max_drawdown: f64 },

    #[error("Emergency halt: {0}")]
    EmergencyHalt(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("A cycle is already in progress")]
    CycleInProgress,

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Cycle body panicked: {0}")]
    CyclePanicked(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type DomainResult<T> = Result<T, ControlError>;

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientExecution { .. } => ErrorKind::TransientExecution,
            Self::StabilityWarning(_) => ErrorKind::StabilityWarning,
            Self::CircuitBreakerTripped { .. } => ErrorKind::CircuitBreakerTripped,
            Self::EmergencyHalt(_) => ErrorKind::EmergencyHalt,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::CycleInProgress | Self::UnknownActivity(_) | Self::Validation(_) => {
                ErrorKind::Usage
            }
            Self::CyclePanicked(_) => ErrorKind::CyclePanicked,
        }
    }

    /// The activity this error concerns, when it is activity-scoped.
    pub fn activity(&self) -> Option<&str> {
        match self {
            Self::TransientExecution { activity, .. } => Some(activity),
            Self::UnknownActivity(id) => Some(id),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        ControlError::Persistence(err.to_string())
    }
}

/// Serializable classification of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientExecution,
    StabilityWarning,
    CircuitBreakerTripped,
    EmergencyHalt,
    Persistence,
    CyclePanicked,
    Usage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientExecution => "transient_execution",
            Self::StabilityWarning => "stability_warning",
            Self::CircuitBreakerTripped => "circuit_breaker_tripped",
            Self::EmergencyHalt => "emergency_halt",
            Self::Persistence => "persistence",
            Self::CyclePanicked => "cycle_panicked",
            Self::Usage => "usage",
        }
    }
}

/// An error captured during a cycle, as surfaced in `CycleResult.errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub activity: Option<String>,
    pub message: String,
}

impl From<&ControlError> for RecordedError {
    fn from(err: &ControlError) -> Self {
        Self {
            kind: err.kind(),
            activity: err.activity().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<ControlError> for RecordedError {
    fn from(err: ControlError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_error_carries_activity() {
        let err = ControlError::TransientExecution {
            activity: "x".into(),
            reason: "timeout".into(),
        };
        let recorded = RecordedError::from(&err);
        assert_eq!(recorded.kind, ErrorKind::TransientExecution);
        assert_eq!(recorded.activity.as_deref(), Some("x"));
        assert!(recorded.message.contains("timeout"));
    }

    #[test]
    fn test_breaker_message_formatting() {
        let err = ControlError::CircuitBreakerTripped {
            drawdown: 0.5,
            max_drawdown: 0.3,
        };
        assert_eq!(
            err.to_string(),
            "Circuit breaker tripped: drawdown 0.500 exceeds 0.300"
        );
        assert_eq!(err.kind().as_str(), "circuit_breaker_tripped");
    }
}
