use qflow_core::config::SchedulerSettings;
use qflow_core::TaskClass;
use serde::{Deserialize, Serialize};

/// Weights and base durations used by the priority scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score contributed per priority point.
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,
    /// Cap on the wait-time bonus, in seconds waited.
    #[serde(default = "default_max_wait_bonus")]
    pub max_wait_bonus: f64,
    #[serde(default = "default_security_weight")]
    pub security_weight: f64,
    #[serde(default = "default_distribution_weight")]
    pub distribution_weight: f64,
    #[serde(default = "default_analysis_weight")]
    pub analysis_weight: f64,
    #[serde(default = "default_security_base_ms")]
    pub security_base_ms: f64,
    #[serde(default = "default_distribution_base_ms")]
    pub distribution_base_ms: f64,
    #[serde(default = "default_analysis_base_ms")]
    pub analysis_base_ms: f64,
    #[serde(default = "default_other_base_ms")]
    pub other_base_ms: f64,
}

fn default_priority_weight() -> f64 { 100.0 }
fn default_max_wait_bonus() -> f64 { 30.0 }
fn default_security_weight() -> f64 { 50.0 }
fn default_distribution_weight() -> f64 { 30.0 }
fn default_analysis_weight() -> f64 { 10.0 }
fn default_security_base_ms() -> f64 { 300.0 }
fn default_distribution_base_ms() -> f64 { 600.0 }
fn default_analysis_base_ms() -> f64 { 1200.0 }
fn default_other_base_ms() -> f64 { 1000.0 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            priority_weight: default_priority_weight(),
            max_wait_bonus: default_max_wait_bonus(),
            security_weight: default_security_weight(),
            distribution_weight: default_distribution_weight(),
            analysis_weight: default_analysis_weight(),
            security_base_ms: default_security_base_ms(),
            distribution_base_ms: default_distribution_base_ms(),
            analysis_base_ms: default_analysis_base_ms(),
            other_base_ms: default_other_base_ms(),
        }
    }
}

impl ScoringConfig {
    pub fn type_weight(&self, class: TaskClass) -> f64 {
        match class {
            TaskClass::Security => self.security_weight,
            TaskClass::Distribution => self.distribution_weight,
            TaskClass::Analysis => self.analysis_weight,
            TaskClass::Other => 0.0,
        }
    }

    pub fn base_duration_ms(&self, class: TaskClass) -> f64 {
        match class {
            TaskClass::Security => self.security_base_ms,
            TaskClass::Distribution => self.distribution_base_ms,
            TaskClass::Analysis => self.analysis_base_ms,
            TaskClass::Other => self.other_base_ms,
        }
    }
}

/// Task queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Retries allowed per logical task before it stays failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How many head-of-queue entries `get_next_task` compares.
    #[serde(default = "default_selection_window")]
    pub selection_window: usize,
    /// Priority for submissions that leave it unset.
    #[serde(default = "default_priority")]
    pub default_priority: u8,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_max_retries() -> u32 { qflow_core::MAX_RETRIES }
fn default_selection_window() -> usize { 5 }
fn default_priority() -> u8 { qflow_core::DEFAULT_PRIORITY }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            selection_window: default_selection_window(),
            default_priority: default_priority(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            max_retries: settings.max_retries.min(qflow_core::MAX_RETRIES),
            selection_window: settings.selection_window.max(1),
            default_priority: settings.default_priority.min(qflow_core::MAX_PRIORITY),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Point-in-time view of queue health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueHealth {
    pub queue_length: usize,
    pub processing_count: usize,
    pub completed_count: usize,
    /// Logical tasks that failed terminally (retries exhausted or not recoverable).
    pub failed_count: usize,
    /// Mean time pending tasks have waited so far.
    pub average_wait_time_ms: f64,
    /// `completed / (completed + failed)`, 1.0 before anything has finished.
    pub success_rate: f64,
    pub throughput_per_minute: f64,
}
