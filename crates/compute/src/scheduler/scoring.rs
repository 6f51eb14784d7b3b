use chrono::{DateTime, Utc};
use qflow_core::{TaskKind, TaskRecord};

use super::types::ScoringConfig;

/// Queue length contributes 5% extra estimated duration per queued task.
const QUEUE_LOAD_FACTOR: f64 = 0.05;
/// Each priority point shaves 10% off the estimate, down to half.
const PRIORITY_SPEEDUP: f64 = 0.1;
const MIN_PRIORITY_FACTOR: f64 = 0.5;

const SELECTION_PRIORITY_WEIGHT: f64 = 10.0;
const SELECTION_WAIT_WEIGHT: f64 = 5.0;
const SELECTION_WAIT_SCALE_MS: f64 = 10_000.0;
const SELECTION_MAX_WAIT_FACTOR: f64 = 2.0;
const SELECTION_MIN_DURATION_MS: f64 = 100.0;

/// Computes ranking scores and duration estimates for task records.
#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    config: ScoringConfig,
}

impl PriorityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Queue ordering score: `priority*100 + min(wait_s, 30) + type_weight`.
    pub fn score(&self, task: &TaskRecord, now: DateTime<Utc>) -> f64 {
        let wait_bonus = (task.wait_ms(now) as f64 / 1000.0).min(self.config.max_wait_bonus);
        task.priority as f64 * self.config.priority_weight
            + wait_bonus
            + self.config.type_weight(task.kind.class())
    }

    /// Expected processing time for a new task given the current queue length.
    pub fn estimate_duration(&self, kind: &TaskKind, priority: u8, queue_len: usize) -> u64 {
        let base = self.config.base_duration_ms(kind.class());
        let load = 1.0 + QUEUE_LOAD_FACTOR * queue_len as f64;
        let urgency = (1.0 - PRIORITY_SPEEDUP * priority as f64).max(MIN_PRIORITY_FACTOR);
        (base * load * urgency).round() as u64
    }

    /// Score used when picking among the head of the queue. Favors high
    /// priority, long waits, and short expected runs.
    pub fn selection_score(&self, task: &TaskRecord, now: DateTime<Utc>) -> f64 {
        let waiting_factor =
            (task.wait_ms(now) as f64 / SELECTION_WAIT_SCALE_MS).min(SELECTION_MAX_WAIT_FACTOR);
        let duration = (task.estimated_duration_ms as f64).max(SELECTION_MIN_DURATION_MS);
        task.priority as f64 * SELECTION_PRIORITY_WEIGHT
            + waiting_factor * SELECTION_WAIT_WEIGHT
            + 1000.0 / duration
    }
}
