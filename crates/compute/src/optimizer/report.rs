use std::collections::{BTreeMap, HashMap};

use qflow_core::{TaskClass, WorkflowTaskSpec};
use serde::Serialize;

use super::strategy::{Strategy, FAVORED_CLASS};
use crate::algorithms::Bottleneck;

/// Speedup is reported within this range.
pub const MIN_SPEEDUP: f64 = 1.0;
pub const MAX_SPEEDUP: f64 = 10.0;

/// Resource totals for one task class in the optimized plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAllocation {
    pub task_count: usize,
    pub total_units: f64,
    pub average_units: f64,
    pub total_memory_mb: f64,
    pub average_memory_mb: f64,
    pub total_cpu_time_ms: f64,
    pub average_cpu_time_ms: f64,
    /// `1 + fraction of this class flagged parallel`.
    pub parallelism_factor: f64,
}

/// Result of optimizing one workflow plan.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub strategy: Strategy,
    pub task_count: usize,
    /// Sum of durations before the transform.
    pub original_execution_time_ms: f64,
    /// Sum of durations after the transform.
    pub optimized_execution_time_ms: f64,
    /// Dependency-aware makespan of the optimized plan.
    pub optimized_parallel_time_ms: f64,
    pub time_reduction_ms: f64,
    pub time_reduction_percent: f64,
    pub advantage: f64,
    pub speedup: f64,
    pub resource_utilization: f64,
    /// Task id -> position in the dependency order.
    pub task_order: BTreeMap<String, usize>,
    pub critical_path: Vec<String>,
    pub bottlenecks: Vec<Bottleneck>,
    pub cycles: Vec<Vec<String>>,
    pub resource_allocation: BTreeMap<TaskClass, ResourceAllocation>,
    pub optimized_tasks: Vec<WorkflowTaskSpec>,
}

pub(super) fn time_reduction(original: f64, optimized: f64) -> (f64, f64) {
    let reduction = original - optimized;
    let percent = if original > 0.0 {
        reduction / original * 100.0
    } else {
        0.0
    };
    (reduction, percent)
}

pub(super) fn speedup(original: f64, optimized: f64) -> f64 {
    if original <= 0.0 || optimized <= 0.0 {
        return MIN_SPEEDUP;
    }
    (original / optimized).clamp(MIN_SPEEDUP, MAX_SPEEDUP)
}

/// Share of favored-class tasks weighted by their mean declared efficiency.
///
/// Missing efficiency counts as 1.0.
pub(super) fn advantage(tasks: &[WorkflowTaskSpec]) -> f64 {
    let favored: Vec<f64> = tasks
        .iter()
        .filter(|t| t.class() == FAVORED_CLASS)
        .map(|t| t.efficiency.unwrap_or(1.0))
        .collect();
    if favored.is_empty() {
        return 0.0;
    }
    let mean_efficiency = favored.iter().sum::<f64>() / favored.len() as f64;
    favored.len() as f64 / tasks.len() as f64 * mean_efficiency
}

/// Parallel-flagged tasks count fully, the rest at half weight.
pub(super) fn utilization(tasks: &[WorkflowTaskSpec]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let total = tasks.len() as f64;
    let parallel = tasks.iter().filter(|t| t.parallel_executable).count() as f64;
    (parallel + 0.5 * (total - parallel)) / total
}

pub(super) fn task_order(order: &[String]) -> BTreeMap<String, usize> {
    order
        .iter()
        .enumerate()
        .map(|(position, id)| (id.clone(), position))
        .collect()
}

pub(super) fn resource_allocation(
    tasks: &[WorkflowTaskSpec],
) -> BTreeMap<TaskClass, ResourceAllocation> {
    let mut by_class: HashMap<TaskClass, Vec<&WorkflowTaskSpec>> = HashMap::new();
    for task in tasks {
        by_class.entry(task.class()).or_default().push(task);
    }

    by_class
        .into_iter()
        .map(|(class, members)| {
            let n = members.len() as f64;
            let total_units: f64 = members.iter().map(|t| t.resources.units).sum();
            let total_memory_mb: f64 = members.iter().map(|t| t.resources.memory_mb).sum();
            let total_cpu_time_ms: f64 = members.iter().map(|t| t.resources.cpu_time_ms).sum();
            let parallel = members.iter().filter(|t| t.parallel_executable).count() as f64;
            let allocation = ResourceAllocation {
                task_count: members.len(),
                total_units,
                average_units: total_units / n,
                total_memory_mb,
                average_memory_mb: total_memory_mb / n,
                total_cpu_time_ms,
                average_cpu_time_ms: total_cpu_time_ms / n,
                parallelism_factor: 1.0 + parallel / n,
            };
            (class, allocation)
        })
        .collect()
}
