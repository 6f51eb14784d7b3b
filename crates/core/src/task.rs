use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{QflowError, Result};

/// Highest priority a task may carry; submitted values are clamped to `0..=MAX_PRIORITY`.
pub const MAX_PRIORITY: u8 = 10;

/// Priority assigned when a submission leaves it unset.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Hard ceiling on retries per logical task. Configuration may only lower it.
pub const MAX_RETRIES: u32 = 3;

/// Clamp an arbitrary requested priority into `0..=MAX_PRIORITY`.
pub fn clamp_priority(requested: i64) -> u8 {
    requested.clamp(0, MAX_PRIORITY as i64) as u8
}

// ── Status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ── Kind / class ──────────────────────────────────────────────

/// Coarse grouping of task types used for scoring weights and resource summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    Security,
    Distribution,
    Analysis,
    Other,
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Distribution => write!(f, "distribution"),
            Self::Analysis => write!(f, "analysis"),
            Self::Other => write!(f, "other"),
        }
    }
}

const SECURITY_KINDS: &[&str] = &[
    "encryption",
    "decryption",
    "security",
    "quantum-encryption",
    "key-generation",
    "signature",
];

const DISTRIBUTION_KINDS: &[&str] = &["distribution", "key-distribution", "qkd", "network-sync"];

const ANALYSIS_KINDS: &[&str] = &[
    "analysis",
    "ai-analysis",
    "inference",
    "optimization",
    "ledger-analysis",
];

/// Domain type tag of a task (e.g. `encryption`, `ai-analysis`).
///
/// Handlers are routed by this tag; the scheduler only looks at its [`TaskClass`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKind(String);

impl TaskKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the tag, case-insensitively.
    pub fn class(&self) -> TaskClass {
        let lower = self.0.trim().to_lowercase();
        let tag = lower.as_str();
        if SECURITY_KINDS.contains(&tag) {
            TaskClass::Security
        } else if DISTRIBUTION_KINDS.contains(&tag) {
            TaskClass::Distribution
        } else if ANALYSIS_KINDS.contains(&tag) {
            TaskClass::Analysis
        } else {
            TaskClass::Other
        }
    }
}

impl From<&str> for TaskKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Failure info ──────────────────────────────────────────────

/// Failure category derived from a handler's error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    Timeout,
    Memory,
    Permission,
    Network,
    QuantumHardware,
    Unknown,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Memory => write!(f, "memory"),
            Self::Permission => write!(f, "permission"),
            Self::Network => write!(f, "network"),
            Self::QuantumHardware => write!(f, "quantum-hardware"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Set once the attempt has failed.
    pub error_type: Option<ErrorType>,
    pub recoverable: bool,
    /// Number of retries that preceded this attempt (0 for the first attempt).
    pub retry_count: u32,
}

impl Default for FailureInfo {
    fn default() -> Self {
        Self {
            error_type: None,
            recoverable: true,
            retry_count: 0,
        }
    }
}

// ── Submission spec ───────────────────────────────────────────

/// What a caller submits to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Requested priority; clamped into `0..=10`, defaults to 5.
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub payload: Value,
    /// Optional wall-clock deadline honored by the dispatcher.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskSpec {
    pub fn new(kind: impl Into<TaskKind>) -> Self {
        Self {
            kind: kind.into(),
            priority: None,
            dependencies: Vec::new(),
            payload: Value::Null,
            deadline: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reject specs the scheduler cannot accept. Out-of-range priorities are not
    /// an error; they are clamped on submission.
    pub fn validate(&self) -> Result<()> {
        if self.kind.as_str().trim().is_empty() {
            return Err(QflowError::InvalidSpec("task type must not be empty".into()));
        }
        if let Some(dep) = self.dependencies.iter().find(|d| d.trim().is_empty()) {
            return Err(QflowError::InvalidSpec(format!(
                "dependency id must not be empty (got {:?})",
                dep
            )));
        }
        Ok(())
    }
}

// ── Task record ───────────────────────────────────────────────

/// The scheduler's unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub priority: u8,
    pub dependencies: BTreeSet<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub queued_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub failure_info: FailureInfo,
    pub estimated_duration_ms: u64,
    /// Lineage id shared by every attempt of the same logical task.
    pub original_task_id: String,
    /// 0 for the first attempt, incremented on each retry.
    pub attempt: u32,
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Build a fresh pending record for a validated spec.
    pub fn new_pending(
        spec: &TaskSpec,
        priority: u8,
        estimated_duration_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            original_task_id: id.clone(),
            id,
            kind: spec.kind.clone(),
            status: TaskStatus::Pending,
            priority: priority.min(MAX_PRIORITY),
            dependencies: spec.dependencies.iter().cloned().collect(),
            payload: spec.payload.clone(),
            created_at: now,
            queued_at: now,
            start_time: None,
            completed_at: None,
            processing_time_ms: None,
            result: None,
            error: None,
            failure_info: FailureInfo::default(),
            estimated_duration_ms,
            attempt: 0,
            deadline: spec.deadline,
        }
    }

    /// Derive the next attempt of this task: fresh id, same lineage, pending.
    pub fn next_attempt(
        &self,
        priority: u8,
        retry_count: u32,
        estimated_duration_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: self.kind.clone(),
            status: TaskStatus::Pending,
            priority: priority.min(MAX_PRIORITY),
            dependencies: self.dependencies.clone(),
            payload: self.payload.clone(),
            created_at: now,
            queued_at: now,
            start_time: None,
            completed_at: None,
            processing_time_ms: None,
            result: None,
            error: None,
            failure_info: FailureInfo {
                retry_count,
                ..FailureInfo::default()
            },
            estimated_duration_ms,
            original_task_id: self.original_task_id.clone(),
            attempt: self.attempt + 1,
            deadline: self.deadline,
        }
    }

    /// Milliseconds spent in the queue as of `now` (never negative).
    pub fn wait_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.queued_at)
            .num_milliseconds()
            .max(0)
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_priority_bounds() {
        assert_eq!(clamp_priority(-3), 0);
        assert_eq!(clamp_priority(7), 7);
        assert_eq!(clamp_priority(42), 10);
    }

    #[test]
    fn kind_classification_is_case_insensitive() {
        assert_eq!(TaskKind::from("Encryption").class(), TaskClass::Security);
        assert_eq!(TaskKind::from("qkd").class(), TaskClass::Distribution);
        assert_eq!(TaskKind::from("AI-Analysis").class(), TaskClass::Analysis);
        assert_eq!(TaskKind::from("ledger-write").class(), TaskClass::Other);
    }

    #[test]
    fn spec_validation() {
        assert!(TaskSpec::new("encryption").validate().is_ok());
        assert!(TaskSpec::new("   ").validate().is_err());
        assert!(TaskSpec::new("analysis")
            .with_dependencies(["a", ""])
            .validate()
            .is_err());
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: TaskSpec = serde_json::from_str(r#"{"type": "analysis"}"#).unwrap();
        assert_eq!(spec.kind.as_str(), "analysis");
        assert!(spec.priority.is_none());
        assert!(spec.dependencies.is_empty());
        assert_eq!(spec.payload, Value::Null);
    }

    #[test]
    fn next_attempt_keeps_lineage() {
        let now = Utc::now();
        let spec = TaskSpec::new("network-sync").with_dependencies(["x"]);
        let first = TaskRecord::new_pending(&spec, 4, 600, now);
        assert_eq!(first.original_task_id, first.id);
        assert!(!first.is_retry());

        let second = first.next_attempt(5, 1, 600, now);
        assert_ne!(second.id, first.id);
        assert_eq!(second.original_task_id, first.id);
        assert_eq!(second.attempt, 1);
        assert_eq!(second.failure_info.retry_count, 1);
        assert_eq!(second.status, TaskStatus::Pending);
        assert!(second.dependencies.contains("x"));
    }

    #[test]
    fn wait_ms_never_negative() {
        let now = Utc::now();
        let record = TaskRecord::new_pending(&TaskSpec::new("analysis"), 5, 1000, now);
        assert_eq!(record.wait_ms(now - chrono::Duration::seconds(5)), 0);
        assert_eq!(record.wait_ms(now + chrono::Duration::milliseconds(1500)), 1500);
    }

    #[test]
    fn status_display() {
        assert_eq!(TaskStatus::Processing.to_string(), "processing");
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }
}
