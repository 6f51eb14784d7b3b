use chrono::{DateTime, Utc};
use qflow_core::{QflowError, Result, TaskRecord, TaskStatus};
use serde_json::Value;
use tracing::{debug, warn};

use super::core::TaskQueue;
use crate::scheduler::retry::{classify, GiveUpReason, RetryDecision};

impl TaskQueue {
    /// Activate the best task near the head of the queue.
    pub fn get_next_task(&mut self) -> Option<TaskRecord> {
        self.get_next_task_at(Utc::now())
    }

    /// Pick among the first `selection_window` pending entries by selection
    /// score (first wins on ties) and make it the active task.
    ///
    /// Returns `None` when nothing is pending or the active slot is taken.
    pub fn get_next_task_at(&mut self, now: DateTime<Utc>) -> Option<TaskRecord> {
        if let Some(active) = &self.active {
            debug!(active_id = %active, "Active slot occupied, not selecting");
            return None;
        }
        if self.pending.is_empty() {
            return None;
        }

        let window = self.config.selection_window.max(1).min(self.pending.len());
        let mut best: Option<(usize, f64)> = None;
        for (index, id) in self.pending[..window].iter().enumerate() {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            let score = self.scorer.selection_score(task, now);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        let (index, score) = best?;
        let id = self.pending.remove(index);
        let task = self.tasks.get_mut(&id)?;
        task.status = TaskStatus::Processing;
        task.start_time = Some(now);
        self.active = Some(id.clone());

        debug!(task_id = %id, kind = %task.kind, selection_score = score, "Task activated");
        Some(task.clone())
    }

    /// Mark the active task completed with `result`.
    pub fn complete_task(&mut self, id: &str, result: Value) -> Result<()> {
        self.complete_task_at(id, result, Utc::now())
    }

    pub fn complete_task_at(&mut self, id: &str, result: Value, now: DateTime<Utc>) -> Result<()> {
        let task = self.processing_task_mut(id, TaskStatus::Completed)?;
        let start = task.start_time.unwrap_or(now);
        let completed_at = now.max(start);
        let processing_ms = completed_at.signed_duration_since(start).num_milliseconds();

        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.completed_at = Some(completed_at);
        task.processing_time_ms = Some(processing_ms);

        debug!(task_id = %id, processing_ms, "Task completed");
        self.completed.push(id.to_string());
        self.clear_active(id);
        self.metrics.record_completion(processing_ms, completed_at);
        Ok(())
    }

    /// Mark the active task failed. Returns the id of the retry attempt when
    /// one was spawned.
    pub fn fail_task(&mut self, id: &str, error: &str) -> Result<Option<String>> {
        self.fail_task_at(id, error, Utc::now())
    }

    pub fn fail_task_at(
        &mut self,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let classification = classify(error);
        let retry_policy = self.retry_policy;

        let task = self.processing_task_mut(id, TaskStatus::Failed)?;
        let start = task.start_time.unwrap_or(now);
        let completed_at = now.max(start);

        task.status = TaskStatus::Failed;
        task.error = Some(error.to_string());
        task.completed_at = Some(completed_at);
        task.processing_time_ms = Some(completed_at.signed_duration_since(start).num_milliseconds());
        task.failure_info.error_type = Some(classification.error_type);
        task.failure_info.recoverable = classification.recoverable;

        let decision = retry_policy.decide(task, &classification);
        let failed = task.clone();
        self.clear_active(id);

        match decision {
            RetryDecision::Retry { retry_count, priority } => {
                let estimate =
                    self.scorer
                        .estimate_duration(&failed.kind, priority, self.pending.len());
                let retry = failed.next_attempt(priority, retry_count, estimate, now);
                warn!(
                    task_id = %id,
                    retry_id = %retry.id,
                    error_type = %classification.error_type,
                    attempt = retry.attempt,
                    "Task failed, retrying"
                );
                self.metrics.record_failure(false);
                self.metrics.record_retry();
                Ok(Some(self.enqueue(retry, now)))
            }
            RetryDecision::GiveUp(reason) => {
                match reason {
                    GiveUpReason::NonRecoverable => warn!(
                        task_id = %id,
                        error_type = %classification.error_type,
                        "Task failed with non-recoverable error"
                    ),
                    GiveUpReason::Exhausted => warn!(
                        task_id = %id,
                        retries = failed.failure_info.retry_count,
                        "Task failed, retries exhausted"
                    ),
                }
                self.failed.push(id.to_string());
                self.metrics.record_failure(true);
                Ok(None)
            }
        }
    }

    /// Fail whatever task holds the active slot.
    ///
    /// Operator escape hatch for a handler that never resolves; the queue
    /// never calls this on its own.
    pub fn release_active(&mut self, reason: &str) -> Result<Option<String>> {
        self.release_active_at(reason, Utc::now())
    }

    pub fn release_active_at(&mut self, reason: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let id = self.active.clone().ok_or(QflowError::NoActiveTask)?;
        self.fail_task_at(&id, reason, now)
    }

    fn processing_task_mut(&mut self, id: &str, to: TaskStatus) -> Result<&mut TaskRecord> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| QflowError::TaskNotFound(id.to_string()))?;
        if task.status != TaskStatus::Processing {
            return Err(QflowError::InvalidTransition {
                id: id.to_string(),
                from: task.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(task)
    }

    fn clear_active(&mut self, id: &str) {
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
    }
}
