use std::env;

use serde::{Deserialize, Serialize};

use crate::task::DEFAULT_PRIORITY;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerSettings,
    pub dispatch: DispatchSettings,
    pub optimizer: OptimizerSettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `QFLOW_PROFILE`. When set (e.g. `BENCH`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("QFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerSettings::from_env_profiled(p),
            dispatch: DispatchSettings::from_env_profiled(p),
            optimizer: OptimizerSettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   max_retries={}, selection_window={}, default_priority={}",
            self.scheduler.max_retries,
            self.scheduler.selection_window,
            self.scheduler.default_priority
        );
        tracing::info!(
            "  dispatch:    poll_interval_ms={}, handler_deadline_ms={}",
            self.dispatch.poll_interval_ms,
            self.dispatch
                .handler_deadline_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!("  optimizer:   seed={}", self.optimizer.seed);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            scheduler: SchedulerSettings::default(),
            dispatch: DispatchSettings::default(),
            optimizer: OptimizerSettings::default(),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub max_retries: u32,
    pub selection_window: usize,
    pub default_priority: u8,
}

impl SchedulerSettings {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_retries: profiled_env_parse(p, "QFLOW_MAX_RETRIES", d.max_retries)
                .min(crate::task::MAX_RETRIES),
            selection_window: profiled_env_parse(p, "QFLOW_SELECTION_WINDOW", d.selection_window)
                .max(1),
            default_priority: profiled_env_parse(p, "QFLOW_DEFAULT_PRIORITY", d.default_priority)
                .min(crate::task::MAX_PRIORITY),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_retries: crate::task::MAX_RETRIES,
            selection_window: 5,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    pub poll_interval_ms: u64,
    /// Upper bound on a single handler invocation. `None` = wait forever.
    pub handler_deadline_ms: Option<u64>,
}

impl DispatchSettings {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            poll_interval_ms: profiled_env_parse(p, "QFLOW_POLL_INTERVAL_MS", d.poll_interval_ms),
            handler_deadline_ms: profiled_env_opt(p, "QFLOW_HANDLER_DEADLINE_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            handler_deadline_ms: None,
        }
    }
}

// ── Optimizer ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub seed: u64,
}

impl OptimizerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            seed: profiled_env_parse(p, "QFLOW_OPTIMIZER_SEED", Self::default().seed),
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self { seed: 42 }
    }
}
