use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use qflow_core::{TaskRecord, TaskStatus};

use crate::scheduler::metrics::{MetricsAggregator, PerformanceSnapshot};
use crate::scheduler::retry::RetryPolicy;
use crate::scheduler::scoring::PriorityScorer;
use crate::scheduler::types::{QueueHealth, SchedulerConfig};

/// Thread-safe handle for callers that share one queue. Every mutation is
/// serialized through the single mutex.
pub type SharedTaskQueue = Arc<Mutex<TaskQueue>>;

/// Create a new shared task queue.
pub fn new_shared_queue(config: SchedulerConfig) -> SharedTaskQueue {
    Arc::new(Mutex::new(TaskQueue::new(config)))
}

/// In-memory priority queue with a single active-task slot.
///
/// The queue never executes anything. A driving loop pulls work with
/// [`get_next_task`](TaskQueue::get_next_task), runs it elsewhere, and reports
/// back through [`complete_task`](TaskQueue::complete_task) or
/// [`fail_task`](TaskQueue::fail_task).
///
/// Ordering is dependency-agnostic: a task whose dependencies have not
/// completed can still be selected.
pub struct TaskQueue {
    pub(super) config: SchedulerConfig,
    pub(super) scorer: PriorityScorer,
    pub(super) retry_policy: RetryPolicy,
    /// Every record ever submitted, by id.
    pub(super) tasks: HashMap<String, TaskRecord>,
    /// Pending ids, highest score first (as scored at each insertion).
    pub(super) pending: Vec<String>,
    /// The one task currently processing.
    pub(super) active: Option<String>,
    pub(super) completed: Vec<String>,
    /// Terminally failed ids (no retry spawned).
    pub(super) failed: Vec<String>,
    pub(super) metrics: MetricsAggregator,
}

impl TaskQueue {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            scorer: PriorityScorer::new(config.scoring.clone()),
            retry_policy: RetryPolicy::new(config.max_retries),
            config,
            tasks: HashMap::new(),
            pending: Vec::new(),
            active: None,
            completed: Vec::new(),
            failed: Vec::new(),
            metrics: MetricsAggregator::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn scorer(&self) -> &PriorityScorer {
        &self.scorer
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True when nothing is pending and nothing is active.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    pub fn get_task(&self, id: &str) -> Option<TaskRecord> {
        self.tasks.get(id).cloned()
    }

    pub fn active_task(&self) -> Option<TaskRecord> {
        self.active.as_deref().and_then(|id| self.get_task(id))
    }

    /// Pending ids in queue order.
    pub fn pending_ids(&self) -> &[String] {
        &self.pending
    }

    /// Pending records in queue order.
    pub fn pending_tasks(&self) -> Vec<TaskRecord> {
        self.pending
            .iter()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect()
    }

    /// Every record, newest first.
    pub fn get_all_tasks_sorted(&self) -> Vec<TaskRecord> {
        let mut all: Vec<TaskRecord> = self.tasks.values().cloned().collect();
        sort_newest_first(&mut all);
        all
    }

    /// Records currently in `status`, newest first.
    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<TaskRecord> {
        let mut matching: Vec<TaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        matching
    }

    /// All attempts of one logical task, first attempt first.
    pub fn get_lineage(&self, original_task_id: &str) -> Vec<TaskRecord> {
        let mut attempts: Vec<TaskRecord> = self
            .tasks
            .values()
            .filter(|t| t.original_task_id == original_task_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|t| t.attempt);
        attempts
    }

    pub fn get_queue_health_metrics(&self) -> QueueHealth {
        self.get_queue_health_metrics_at(Utc::now())
    }

    pub fn get_queue_health_metrics_at(&self, now: DateTime<Utc>) -> QueueHealth {
        let queue_length = self.pending.len();
        let average_wait_time_ms = if queue_length == 0 {
            0.0
        } else {
            let total: i64 = self
                .pending
                .iter()
                .filter_map(|id| self.tasks.get(id))
                .map(|t| t.wait_ms(now))
                .sum();
            total as f64 / queue_length as f64
        };

        let completed_count = self.completed.len();
        let failed_count = self.failed.len();
        let finished = completed_count + failed_count;
        let success_rate = if finished == 0 {
            1.0
        } else {
            completed_count as f64 / finished as f64
        };

        QueueHealth {
            queue_length,
            processing_count: usize::from(self.active.is_some()),
            completed_count,
            failed_count,
            average_wait_time_ms,
            success_rate,
            throughput_per_minute: self.metrics.throughput_per_minute(now),
        }
    }

    pub fn get_performance_metrics(&self) -> PerformanceSnapshot {
        self.metrics.snapshot(Utc::now())
    }

    pub fn get_performance_metrics_at(&self, now: DateTime<Utc>) -> PerformanceSnapshot {
        self.metrics.snapshot(now)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn sort_newest_first(records: &mut [TaskRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.attempt.cmp(&a.attempt))
            .then_with(|| a.id.cmp(&b.id))
    });
}
