use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use qflow_core::{QflowError, TaskClass, WorkflowTaskSpec, MAX_PRIORITY};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// How a workflow plan is rewritten before being re-estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Flag ~70% of root tasks as parallel and shorten the flagged ones.
    Parallel,
    /// Favor security-class work at the expense of everything else.
    PriorityBoost,
    /// Trade some duration for a smaller resource footprint.
    ResourceEfficiency,
    /// A milder mix of the above.
    Balanced,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Parallel,
        Strategy::PriorityBoost,
        Strategy::ResourceEfficiency,
        Strategy::Balanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::PriorityBoost => "priority-boost",
            Self::ResourceEfficiency => "resource-efficiency",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = QflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| QflowError::UnknownStrategy(s.to_string()))
    }
}

/// Task class that the priority-boost strategy and the advantage metric favor.
pub const FAVORED_CLASS: TaskClass = TaskClass::Security;

const PARALLEL_FRACTION: f64 = 0.7;
const BALANCED_PARALLEL_FRACTION: f64 = 0.5;

/// Rewrite `tasks` according to `strategy`. Input is left untouched.
pub fn apply(strategy: Strategy, tasks: &[WorkflowTaskSpec], seed: u64) -> Vec<WorkflowTaskSpec> {
    let mut optimized = tasks.to_vec();
    match strategy {
        Strategy::Parallel => {
            for i in flag_parallel(&mut optimized, PARALLEL_FRACTION, seed) {
                optimized[i].duration_ms *= 0.7;
            }
        }
        Strategy::PriorityBoost => {
            for task in &mut optimized {
                if task.class() == FAVORED_CLASS {
                    task.duration_ms *= 0.6;
                    task.priority = MAX_PRIORITY;
                    task.resources.units *= 1.5;
                } else {
                    task.duration_ms *= 1.1;
                    task.priority = task.priority.saturating_sub(2);
                }
            }
        }
        Strategy::ResourceEfficiency => {
            for task in &mut optimized {
                task.resources.units *= 0.7;
                task.resources.memory_mb *= 0.8;
                task.resources.cpu_time_ms *= 0.9;
                task.duration_ms *= 1.15;
            }
        }
        Strategy::Balanced => {
            for task in &mut optimized {
                task.duration_ms *= 0.85;
                task.resources.units *= 0.9;
                task.resources.memory_mb *= 0.9;
                task.resources.cpu_time_ms *= 0.9;
            }
            flag_parallel(&mut optimized, BALANCED_PARALLEL_FRACTION, seed);
        }
    }
    optimized
}

/// Flag `round(fraction * roots)` of the dependency-free tasks as parallel
/// and return their indices.
///
/// Candidates are ordered by id before sampling, so the choice depends only
/// on the task set and the seed, not on input order.
fn flag_parallel(tasks: &mut [WorkflowTaskSpec], fraction: f64, seed: u64) -> BTreeSet<usize> {
    let mut roots: Vec<usize> = (0..tasks.len())
        .filter(|&i| !tasks[i].has_dependencies())
        .collect();
    roots.sort_by(|&a, &b| tasks[a].id.cmp(&tasks[b].id).then(a.cmp(&b)));

    let amount = ((roots.len() as f64) * fraction).round() as usize;
    let amount = amount.min(roots.len());
    if amount == 0 {
        return BTreeSet::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let chosen: BTreeSet<usize> = index::sample(&mut rng, roots.len(), amount)
        .into_iter()
        .map(|i| roots[i])
        .collect();
    for &i in &chosen {
        tasks[i].parallel_executable = true;
    }
    chosen
}
