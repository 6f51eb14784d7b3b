use std::collections::HashMap;

use qflow_core::{TaskRecord, WorkflowTaskSpec};
use serde::Serialize;

use super::dependency::{topological_order, GraphNode};

/// A graph node with a duration estimate.
pub trait Timed: GraphNode {
    fn duration_ms(&self) -> f64;
}

impl Timed for WorkflowTaskSpec {
    fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

impl Timed for TaskRecord {
    fn duration_ms(&self) -> f64 {
        self.estimated_duration_ms as f64
    }
}

/// Sequential and dependency-aware parallel estimates for one task set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionEstimate {
    pub sequential_ms: f64,
    pub parallel_ms: f64,
    /// `sequential / parallel`, 1.0 when either is zero.
    pub speedup: f64,
}

/// Total time if every task ran one after another.
pub fn sequential_time<T: Timed>(tasks: &[T]) -> f64 {
    tasks.iter().map(Timed::duration_ms).sum()
}

/// Makespan with unlimited parallelism, bounded only by dependencies.
///
/// `finish[t] = duration[t] + max(finish[dep])`. Dependencies outside the set,
/// or not yet finished because of a cycle, contribute nothing.
pub fn parallel_time<T: Timed>(tasks: &[T]) -> f64 {
    let by_id: HashMap<&str, &T> = tasks.iter().map(|t| (t.node_id(), t)).collect();
    let mut finish: HashMap<String, f64> = HashMap::with_capacity(tasks.len());

    for id in topological_order(tasks) {
        let Some(task) = by_id.get(id.as_str()) else {
            continue;
        };
        let ready_at = task
            .dependency_ids()
            .iter()
            .filter_map(|dep| finish.get(*dep))
            .fold(0.0_f64, |acc, &f| acc.max(f));
        finish.insert(id, ready_at + task.duration_ms());
    }

    finish.values().fold(0.0_f64, |acc, &f| acc.max(f))
}

pub fn estimate<T: Timed>(tasks: &[T]) -> ExecutionEstimate {
    let sequential_ms = sequential_time(tasks);
    let parallel_ms = parallel_time(tasks);
    let speedup = if sequential_ms > 0.0 && parallel_ms > 0.0 {
        sequential_ms / parallel_ms
    } else {
        1.0
    };
    ExecutionEstimate {
        sequential_ms,
        parallel_ms,
        speedup,
    }
}
