use std::path::Path;

use anyhow::{Context, Result};
use qflow_compute::algorithms::{analyze, estimate, DependencyAnalysis, ExecutionEstimate};
use qflow_compute::optimizer::{OptimizationReport, OptimizerConfig, Strategy, WorkflowOptimizer};
use qflow_core::WorkflowTaskSpec;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Accepted plan file layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Tasks(Vec<WorkflowTaskSpec>),
    Wrapped { tasks: Vec<WorkflowTaskSpec> },
}

pub fn load_plan(path: &Path) -> Result<Vec<WorkflowTaskSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    let plan: PlanFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse plan file {}", path.display()))?;
    let tasks = match plan {
        PlanFile::Tasks(tasks) | PlanFile::Wrapped { tasks } => tasks,
    };
    info!(path = %path.display(), tasks = tasks.len(), "Plan loaded");
    Ok(tasks)
}

pub fn optimize(plan: &Path, strategy: &str, seed: u64) -> Result<OptimizationReport> {
    let strategy: Strategy = strategy.parse().context("invalid --strategy")?;
    let tasks = load_plan(plan)?;
    let optimizer = WorkflowOptimizer::new(OptimizerConfig { seed });
    Ok(optimizer.optimize_workflow(&tasks, strategy))
}

#[derive(Debug, Serialize)]
pub struct PlanAnalysis {
    pub analysis: DependencyAnalysis,
    pub estimate: ExecutionEstimate,
}

pub fn analyze_plan(plan: &Path) -> Result<PlanAnalysis> {
    let tasks = load_plan(plan)?;
    Ok(PlanAnalysis {
        analysis: analyze(&tasks),
        estimate: estimate(&tasks),
    })
}

pub fn render<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(out)
}
