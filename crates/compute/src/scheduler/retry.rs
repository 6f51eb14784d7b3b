//! Failure classification and bounded retry decisions.

use qflow_core::{ErrorType, TaskRecord, MAX_PRIORITY, MAX_RETRIES};
use serde::{Deserialize, Serialize};

/// Marker that forces a failure to be non-recoverable regardless of its category.
pub const FATAL_MARKER: &str = "fatal";

/// Checked in order; the first matching needle wins.
const CLASSIFIERS: &[(&str, ErrorType)] = &[
    ("timeout", ErrorType::Timeout),
    ("memory", ErrorType::Memory),
    ("permission", ErrorType::Permission),
    ("network", ErrorType::Network),
    ("quantum-hardware", ErrorType::QuantumHardware),
    ("quantum hardware", ErrorType::QuantumHardware),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClassification {
    pub error_type: ErrorType,
    pub recoverable: bool,
}

/// Classify a handler error message by case-insensitive substring match.
pub fn classify(message: &str) -> FailureClassification {
    let lower = message.to_lowercase();
    let error_type = CLASSIFIERS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, t)| *t)
        .unwrap_or(ErrorType::Unknown);
    FailureClassification {
        error_type,
        recoverable: !lower.contains(FATAL_MARKER),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveUpReason {
    NonRecoverable,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryDecision {
    /// Spawn a new attempt with this retry count and priority.
    Retry { retry_count: u32, priority: u8 },
    GiveUp(GiveUpReason),
}

/// Bounded retry with a one-point priority boost per attempt.
///
/// `max_retries` above [`MAX_RETRIES`] is treated as [`MAX_RETRIES`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
        }
    }

    pub fn decide(&self, task: &TaskRecord, failure: &FailureClassification) -> RetryDecision {
        if !failure.recoverable {
            return RetryDecision::GiveUp(GiveUpReason::NonRecoverable);
        }
        let next = task.failure_info.retry_count + 1;
        if next > self.max_retries.min(MAX_RETRIES) {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }
        RetryDecision::Retry {
            retry_count: next,
            priority: task.priority.saturating_add(1).min(MAX_PRIORITY),
        }
    }
}
