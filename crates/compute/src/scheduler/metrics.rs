use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Completions older than this no longer count toward throughput.
const THROUGHPUT_WINDOW_SECS: i64 = 60;

/// Running counters updated by the task queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsAggregator {
    /// Tasks that completed successfully.
    pub tasks_processed: u64,
    /// Incremental mean of processing time over completed tasks.
    pub average_processing_time_ms: f64,
    /// Submissions (including retries) per priority value.
    pub priority_histogram: BTreeMap<u8, u64>,
    /// Logical tasks that failed terminally.
    pub tasks_failed: u64,
    /// Every failed attempt, retried or not.
    pub failed_attempts: u64,
    pub retries_spawned: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    recent_completions: VecDeque<DateTime<Utc>>,
}

/// Serializable copy of the aggregator, with throughput evaluated at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub tasks_processed: u64,
    pub average_processing_time_ms: f64,
    pub priority_histogram: BTreeMap<u8, u64>,
    pub tasks_failed: u64,
    pub failed_attempts: u64,
    pub retries_spawned: u64,
    pub throughput_per_minute: f64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl MetricsAggregator {
    pub fn record_submission(&mut self, priority: u8) {
        *self.priority_histogram.entry(priority).or_default() += 1;
    }

    /// Record a successful completion.
    pub fn record_completion(&mut self, processing_time_ms: i64, at: DateTime<Utc>) {
        self.tasks_processed += 1;

        // Incremental mean: new_avg = prev_avg + (x - prev_avg) / n
        let n = self.tasks_processed as f64;
        let x = processing_time_ms as f64;
        self.average_processing_time_ms += (x - self.average_processing_time_ms) / n;

        self.last_completed_at = Some(at);
        self.recent_completions.push_back(at);
        self.prune(at);
    }

    /// Record a failed attempt; `terminal` when no retry follows.
    pub fn record_failure(&mut self, terminal: bool) {
        self.failed_attempts += 1;
        if terminal {
            self.tasks_failed += 1;
        }
    }

    pub fn record_retry(&mut self) {
        self.retries_spawned += 1;
    }

    /// Completions within the last minute of `now`.
    pub fn throughput_per_minute(&self, now: DateTime<Utc>) -> f64 {
        let cutoff = now - Duration::seconds(THROUGHPUT_WINDOW_SECS);
        self.recent_completions
            .iter()
            .filter(|t| **t > cutoff && **t <= now)
            .count() as f64
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> PerformanceSnapshot {
        PerformanceSnapshot {
            tasks_processed: self.tasks_processed,
            average_processing_time_ms: self.average_processing_time_ms,
            priority_histogram: self.priority_histogram.clone(),
            tasks_failed: self.tasks_failed,
            failed_attempts: self.failed_attempts,
            retries_spawned: self.retries_spawned,
            throughput_per_minute: self.throughput_per_minute(now),
            last_completed_at: self.last_completed_at,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(THROUGHPUT_WINDOW_SECS);
        while self.recent_completions.front().is_some_and(|t| *t <= cutoff) {
            self.recent_completions.pop_front();
        }
    }
}
