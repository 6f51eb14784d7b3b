//! Offline workflow optimizer.
//!
//! Takes a planning-only task set, rewrites it under a [`Strategy`], and
//! reports how the estimated execution time and resource footprint change.
//! Never touches the live scheduler.

pub mod report;
pub mod strategy;

use qflow_core::config::OptimizerSettings;
use qflow_core::WorkflowTaskSpec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::algorithms::{analyze, parallel_time, sequential_time};

pub use report::{OptimizationReport, ResourceAllocation, MAX_SPEEDUP, MIN_SPEEDUP};
pub use strategy::{Strategy, FAVORED_CLASS};

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Seed for the parallel-flag selection.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

impl From<&OptimizerSettings> for OptimizerConfig {
    fn from(settings: &OptimizerSettings) -> Self {
        Self {
            seed: settings.seed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptimizer {
    config: OptimizerConfig,
}

impl WorkflowOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Apply `strategy` to `tasks` and report on the result.
    ///
    /// Cyclic or dangling dependencies never fail; the analysis is
    /// best-effort and the cycles are listed in the report.
    pub fn optimize_workflow(
        &self,
        tasks: &[WorkflowTaskSpec],
        strategy: Strategy,
    ) -> OptimizationReport {
        let original_execution_time_ms = sequential_time(tasks);
        let optimized = strategy::apply(strategy, tasks, self.config.seed);
        let optimized_execution_time_ms = sequential_time(&optimized);
        let optimized_parallel_time_ms = parallel_time(&optimized);

        let analysis = analyze(&optimized);
        if !analysis.cycles.is_empty() {
            warn!(
                cycles = analysis.cycles.len(),
                "Workflow has dependency cycles, ordering is best-effort"
            );
        }

        let (time_reduction_ms, time_reduction_percent) =
            report::time_reduction(original_execution_time_ms, optimized_execution_time_ms);
        let speedup = report::speedup(original_execution_time_ms, optimized_execution_time_ms);

        info!(
            %strategy,
            tasks = tasks.len(),
            original_ms = original_execution_time_ms,
            optimized_ms = optimized_execution_time_ms,
            parallel_ms = optimized_parallel_time_ms,
            speedup,
            "Workflow optimized"
        );

        OptimizationReport {
            strategy,
            task_count: tasks.len(),
            original_execution_time_ms,
            optimized_execution_time_ms,
            optimized_parallel_time_ms,
            time_reduction_ms,
            time_reduction_percent,
            advantage: report::advantage(&optimized),
            speedup,
            resource_utilization: report::utilization(&optimized),
            task_order: report::task_order(&analysis.topological_order),
            critical_path: analysis.critical_path,
            bottlenecks: analysis.bottlenecks,
            cycles: analysis.cycles,
            resource_allocation: report::resource_allocation(&optimized),
            optimized_tasks: optimized,
        }
    }
}

/// Optimize with a default-configured optimizer.
pub fn optimize_workflow(tasks: &[WorkflowTaskSpec], strategy: Strategy) -> OptimizationReport {
    WorkflowOptimizer::default().optimize_workflow(tasks, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<WorkflowTaskSpec> {
        vec![
            WorkflowTaskSpec::new("keys", "key-generation", 100.0),
            WorkflowTaskSpec::new("dist", "qkd", 200.0).with_dependencies(["keys"]),
            WorkflowTaskSpec::new("enc", "encryption", 150.0).with_dependencies(["keys"]),
            WorkflowTaskSpec::new("report", "analysis", 50.0).with_dependencies(["dist", "enc"]),
        ]
    }

    #[test]
    fn empty_plan_reports_zeros() {
        for strategy in Strategy::ALL {
            let report = optimize_workflow(&[], strategy);
            assert_eq!(report.task_count, 0);
            assert_eq!(report.original_execution_time_ms, 0.0);
            assert_eq!(report.optimized_execution_time_ms, 0.0);
            assert_eq!(report.optimized_parallel_time_ms, 0.0);
            assert_eq!(report.time_reduction_ms, 0.0);
            assert_eq!(report.time_reduction_percent, 0.0);
            assert_eq!(report.advantage, 0.0);
            assert_eq!(report.speedup, 1.0);
            assert_eq!(report.resource_utilization, 0.0);
            assert!(report.task_order.is_empty());
            assert!(report.critical_path.is_empty());
            assert!(report.bottlenecks.is_empty());
            assert!(report.cycles.is_empty());
            assert!(report.resource_allocation.is_empty());
        }
    }

    #[test]
    fn parallel_strategy_report() {
        let report = optimize_workflow(&plan(), Strategy::Parallel);

        assert_eq!(report.original_execution_time_ms, 500.0);
        // only the flagged root shrinks: 70 + 200 + 150 + 50
        assert!((report.optimized_execution_time_ms - 470.0).abs() < 1e-9);
        // keys -> dist -> report: 70 + 200 + 50
        assert!((report.optimized_parallel_time_ms - 320.0).abs() < 1e-9);
        assert!((report.time_reduction_percent - 6.0).abs() < 1e-9);
        assert!((report.speedup - 500.0 / 470.0).abs() < 1e-9);

        // the single root is flagged: round(0.7 * 1) = 1
        assert!(report.optimized_tasks[0].parallel_executable);
        assert!((report.resource_utilization - 2.5 / 4.0).abs() < 1e-9);

        assert_eq!(report.critical_path, ["keys", "dist", "report"]);
        assert_eq!(report.bottlenecks.len(), 1);
        assert_eq!(report.bottlenecks[0].task_id, "keys");
        assert_eq!(report.task_order["keys"], 0);
        assert_eq!(report.task_order["report"], 3);
        assert!((report.advantage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn slower_plans_keep_speedup_at_one() {
        let report = optimize_workflow(&plan(), Strategy::ResourceEfficiency);
        assert!(report.time_reduction_ms < 0.0);
        assert_eq!(report.speedup, 1.0);
    }

    #[test]
    fn cycles_are_reported_not_raised() {
        let tasks = vec![
            WorkflowTaskSpec::new("a", "analysis", 10.0).with_dependencies(["b"]),
            WorkflowTaskSpec::new("b", "analysis", 10.0).with_dependencies(["a"]),
        ];
        let report = optimize_workflow(&tasks, Strategy::Balanced);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.task_order.len(), 2);
        assert!(report.optimized_parallel_time_ms > 0.0);
    }

    #[test]
    fn seed_comes_from_config() {
        let tasks: Vec<WorkflowTaskSpec> = (0..12)
            .map(|i| WorkflowTaskSpec::new(format!("t{i:02}"), "analysis", 10.0))
            .collect();
        let optimizer = WorkflowOptimizer::new(OptimizerConfig { seed: 9 });
        let first = optimizer.optimize_workflow(&tasks, Strategy::Parallel);
        let second = optimizer.optimize_workflow(&tasks, Strategy::Parallel);
        assert_eq!(first.optimized_tasks, second.optimized_tasks);
        assert_eq!(
            first.optimized_tasks.iter().filter(|t| t.parallel_executable).count(),
            8
        );
    }

    #[test]
    fn report_serializes_to_json() {
        let report = optimize_workflow(&plan(), Strategy::PriorityBoost);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "priority-boost");
        assert!(json["resource_allocation"]["security"]["task_count"].is_number());
    }
}
