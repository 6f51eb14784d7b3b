use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use qflow_compute::dispatch::{
    DispatchConfig, DispatchSummary, Dispatcher, HandlerError, HandlerRegistry, TaskHandler,
};
use qflow_compute::scheduler::{
    new_shared_queue, PerformanceSnapshot, QueueHealth, SchedulerConfig,
};
use qflow_core::config::Config;
use qflow_core::{TaskKind, TaskSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

const KINDS: &[&str] = &[
    "encryption",
    "key-generation",
    "qkd",
    "network-sync",
    "analysis",
    "inference",
    "ledger-write",
];

const FAILURE_MESSAGES: &[&str] = &[
    "network jitter on quantum channel",
    "timeout waiting for key material",
    "out of memory during inference",
    "quantum-hardware calibration drift",
    "fatal: corrupted payload",
];

/// Fails each task the number of times its payload asks for, then succeeds.
#[derive(Default)]
struct StubHandler {
    calls: Mutex<HashMap<u64, u32>>,
}

#[async_trait]
impl TaskHandler for StubHandler {
    fn name(&self) -> &str {
        "stub"
    }

    fn can_handle(&self, _kind: &TaskKind) -> bool {
        true
    }

    async fn process(&self, payload: Value) -> Result<Value, HandlerError> {
        let sim_id = payload["sim_id"]
            .as_u64()
            .ok_or_else(|| HandlerError::InvalidPayload("missing sim_id".into()))?;
        let fail_times = payload["fail_times"].as_u64().unwrap_or(0);

        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(sim_id).or_default();
            *count += 1;
            *count
        };

        if u64::from(call) <= fail_times {
            let message = payload["message"].as_str().unwrap_or("unknown failure");
            return Err(HandlerError::Failed(message.to_string()));
        }
        Ok(json!({ "sim_id": sim_id, "calls": call }))
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub submitted: usize,
    pub dispatch: DispatchSummary,
    pub health: QueueHealth,
    pub performance: PerformanceSnapshot,
}

/// Generate `count` tasks, drain them through a dispatcher, and report.
pub async fn simulate(
    count: usize,
    fail_rate: f64,
    seed: u64,
    config: &Config,
) -> Result<SimulationReport> {
    ensure!(
        (0.0..=1.0).contains(&fail_rate),
        "--fail-rate must be within [0, 1], got {fail_rate}"
    );

    let queue = new_shared_queue(SchedulerConfig::from(&config.scheduler));
    let mut registry = HandlerRegistry::new();
    registry.register(StubHandler::default())?;
    let dispatcher = Dispatcher::new(
        queue.clone(),
        Arc::new(registry),
        DispatchConfig::from(&config.dispatch),
    );

    let mut rng = StdRng::seed_from_u64(seed);
    {
        let mut q = queue.lock();
        for sim_id in 0..count {
            let kind = KINDS[rng.gen_range(0..KINDS.len())];
            let priority = rng.gen_range(0..=10_i64);
            let fail_times = if rng.gen_bool(fail_rate) {
                rng.gen_range(1..=2_u64)
            } else {
                0
            };
            let message = FAILURE_MESSAGES[rng.gen_range(0..FAILURE_MESSAGES.len())];
            let spec = TaskSpec::new(kind).with_priority(priority).with_payload(json!({
                "sim_id": sim_id,
                "fail_times": fail_times,
                "message": message,
            }));
            q.add_task(spec)?;
        }
    }
    info!(tasks = count, fail_rate, seed, "Simulation queue seeded");

    let dispatch = dispatcher.drain().await;

    let q = queue.lock();
    Ok(SimulationReport {
        seed,
        submitted: count,
        dispatch,
        health: q.get_queue_health_metrics(),
        performance: q.get_performance_metrics(),
    })
}
