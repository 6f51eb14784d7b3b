use serde::{Deserialize, Serialize};

use crate::task::{TaskClass, TaskKind, DEFAULT_PRIORITY};

/// Estimated resource footprint of a planned task.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceEstimate {
    /// Abstract execution units (qubits, GPU slots, ...) the task occupies.
    #[serde(default)]
    pub units: f64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub cpu_time_ms: f64,
}

impl ResourceEstimate {
    pub fn new(units: f64, memory_mb: f64, cpu_time_ms: f64) -> Self {
        Self {
            units,
            memory_mb,
            cpu_time_ms,
        }
    }
}

/// Planning-only task descriptor consumed by the workflow optimizer.
///
/// Never executed; only analyzed and transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTaskSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub duration_ms: f64,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub resources: ResourceEstimate,
    #[serde(default)]
    pub parallel_executable: bool,
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Declared efficiency parameter (e.g. fidelity) of favored-class tasks.
    #[serde(default)]
    pub efficiency: Option<f64>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl WorkflowTaskSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<TaskKind>, duration_ms: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            duration_ms,
            dependencies: Vec::new(),
            resources: ResourceEstimate::default(),
            parallel_executable: false,
            priority: DEFAULT_PRIORITY,
            efficiency: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resources(mut self, resources: ResourceEstimate) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = Some(efficiency);
        self
    }

    pub fn class(&self) -> TaskClass {
        self.kind.class()
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}
