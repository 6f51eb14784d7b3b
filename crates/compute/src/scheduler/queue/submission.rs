use chrono::{DateTime, Utc};
use qflow_core::{clamp_priority, Result, TaskRecord, TaskSpec};
use tracing::debug;

use super::core::TaskQueue;

impl TaskQueue {
    /// Submit a task and return its id.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<String> {
        self.add_task_at(spec, Utc::now())
    }

    /// Submit a task as of `now`.
    ///
    /// Priority is clamped into `0..=10`; a missing priority takes the
    /// configured default. Unmet dependencies do not block submission.
    pub fn add_task_at(&mut self, spec: TaskSpec, now: DateTime<Utc>) -> Result<String> {
        spec.validate()?;

        let priority = spec
            .priority
            .map(clamp_priority)
            .unwrap_or(self.config.default_priority);
        let estimate = self
            .scorer
            .estimate_duration(&spec.kind, priority, self.pending.len());
        let record = TaskRecord::new_pending(&spec, priority, estimate, now);

        debug!(
            task_id = %record.id,
            kind = %record.kind,
            priority,
            estimated_ms = estimate,
            "Task submitted"
        );
        Ok(self.enqueue(record, now))
    }

    /// Insert a pending record before the first entry that scores lower.
    ///
    /// Linear scan; equal scores keep submission order.
    pub(super) fn enqueue(&mut self, record: TaskRecord, now: DateTime<Utc>) -> String {
        let score = self.scorer.score(&record, now);
        let index = self
            .pending
            .iter()
            .position(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|existing| self.scorer.score(existing, now) < score)
            })
            .unwrap_or(self.pending.len());

        let id = record.id.clone();
        self.metrics.record_submission(record.priority);
        self.pending.insert(index, id.clone());
        self.tasks.insert(id.clone(), record);
        id
    }
}
