//! Integration tests for the async dispatcher driving a shared task queue.
//!
//! Handlers are scripted through the task payload, so every run is
//! deterministic: `{"outcome": "ok"}` resolves, `{"outcome": "fail", ...}`
//! rejects with the given message, `{"outcome": "hang"}` never resolves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::timeout;

use qflow_compute::dispatch::{
    DispatchConfig, DispatchOutcome, Dispatcher, HandlerError, HandlerRegistry, TaskHandler,
};
use qflow_compute::scheduler::{new_shared_queue, SchedulerConfig, SharedTaskQueue};
use qflow_core::{ErrorType, TaskClass, TaskKind, TaskSpec, TaskStatus};

const TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(100);

/// Resolves, rejects, or hangs as the payload says.
struct ScriptedHandler;

#[async_trait]
impl TaskHandler for ScriptedHandler {
    fn name(&self) -> &str {
        "scripted"
    }

    fn can_handle(&self, kind: &TaskKind) -> bool {
        kind.class() != TaskClass::Other
    }

    async fn process(&self, payload: Value) -> Result<Value, HandlerError> {
        match payload["outcome"].as_str() {
            Some("ok") => Ok(json!({"echo": payload})),
            Some("fail") => Err(HandlerError::Failed(
                payload["message"].as_str().unwrap_or("unknown").to_string(),
            )),
            Some("hang") => std::future::pending().await,
            _ => Err(HandlerError::InvalidPayload("missing outcome".into())),
        }
    }
}

fn fast_config() -> DispatchConfig {
    DispatchConfig {
        poll_interval: Duration::from_millis(5),
        handler_deadline: None,
    }
}

fn setup(scheduler: SchedulerConfig, dispatch: DispatchConfig) -> (SharedTaskQueue, Arc<Dispatcher>) {
    let queue = new_shared_queue(scheduler);
    let mut registry = HandlerRegistry::new();
    registry.register(ScriptedHandler).unwrap();
    let dispatcher = Arc::new(Dispatcher::new(queue.clone(), Arc::new(registry), dispatch));
    (queue, dispatcher)
}

fn submit(queue: &SharedTaskQueue, kind: &str, priority: i64, payload: Value) -> String {
    queue
        .lock()
        .add_task(TaskSpec::new(kind).with_priority(priority).with_payload(payload))
        .unwrap()
}

#[tokio::test]
async fn drain_completes_every_task() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let ids: Vec<String> = (0..5)
        .map(|p| submit(&queue, "analysis", p, json!({"outcome": "ok", "n": p})))
        .collect();

    let summary = timeout(TIMEOUT, dispatcher.drain()).await.unwrap();
    assert_eq!(summary.dispatched, 5);
    assert_eq!(summary.completed, 5);

    let q = queue.lock();
    assert!(q.is_idle());
    for id in &ids {
        let task = q.get_task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_ref().unwrap()["echo"]["outcome"], "ok");
        assert!(task.processing_time_ms.unwrap() >= 0);
    }
    let health = q.get_queue_health_metrics();
    assert_eq!(health.completed_count, 5);
    assert_eq!(health.success_rate, 1.0);
}

#[tokio::test]
async fn recoverable_failures_retry_until_exhausted() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let original = submit(
        &queue,
        "qkd",
        4,
        json!({"outcome": "fail", "message": "network unreachable"}),
    );

    let summary = timeout(TIMEOUT, dispatcher.drain()).await.unwrap();
    assert_eq!(summary.dispatched, 4);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.retried, 3);

    let q = queue.lock();
    let lineage = q.get_lineage(&original);
    assert_eq!(lineage.len(), 4);
    assert!(lineage
        .iter()
        .all(|t| t.failure_info.error_type == Some(ErrorType::Network)));
    assert_eq!(lineage.last().unwrap().priority, 7);
    assert_eq!(q.get_queue_health_metrics().failed_count, 1);
}

#[tokio::test]
async fn missing_handler_is_fatal() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let id = submit(&queue, "ledger-write", 5, json!({"outcome": "ok"}));

    let outcome = dispatcher.run_once().await.unwrap();
    match outcome {
        DispatchOutcome::Failed { task_id, error, retry_id } => {
            assert_eq!(task_id, id);
            assert!(error.contains("no handler registered for type 'ledger-write'"));
            assert!(retry_id.is_none());
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let q = queue.lock();
    let task = q.get_task(&id).unwrap();
    assert!(!task.failure_info.recoverable);
    assert!(q.is_idle());
}

#[tokio::test]
async fn hanging_handler_holds_the_active_slot() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let stuck = submit(&queue, "encryption", 9, json!({"outcome": "hang"}));
    let waiting = submit(&queue, "analysis", 1, json!({"outcome": "ok"}));

    let runner = Arc::clone(&dispatcher);
    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(SETTLE).await;

    {
        let mut q = queue.lock();
        assert_eq!(q.active_task().unwrap().id, stuck);
        assert_eq!(q.get_task(&waiting).unwrap().status, TaskStatus::Pending);
        assert!(q.get_next_task().is_none(), "slot should still be taken");
        assert_eq!(q.get_queue_health_metrics().processing_count, 1);
    }

    dispatcher.shutdown();
    let summary = timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.completed, 0);

    // The operator can free the slot; the stuck task comes back as a retry.
    let retry = queue.lock().release_active("timeout: released by operator").unwrap();
    assert!(retry.is_some());
    assert_eq!(queue.lock().len(), 2);
}

#[tokio::test]
async fn handler_deadline_fails_as_timeout_and_retries() {
    let scheduler = SchedulerConfig {
        max_retries: 1,
        ..SchedulerConfig::default()
    };
    let dispatch = DispatchConfig {
        handler_deadline: Some(Duration::from_millis(30)),
        ..fast_config()
    };
    let (queue, dispatcher) = setup(scheduler, dispatch);
    let original = submit(&queue, "encryption", 5, json!({"outcome": "hang"}));

    let summary = timeout(TIMEOUT, dispatcher.drain()).await.unwrap();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retried, 1);

    let q = queue.lock();
    let lineage = q.get_lineage(&original);
    assert_eq!(lineage.len(), 2);
    for attempt in &lineage {
        assert_eq!(attempt.status, TaskStatus::Failed);
        assert_eq!(attempt.failure_info.error_type, Some(ErrorType::Timeout));
        assert!(attempt.error.as_deref().unwrap().contains("timeout"));
    }
    assert!(q.is_idle());
}

#[tokio::test]
async fn expired_task_deadline_fails_without_retry() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let id = queue
        .lock()
        .add_task(
            TaskSpec::new("analysis")
                .with_payload(json!({"outcome": "hang"}))
                .with_deadline(Utc::now() - chrono::Duration::seconds(1)),
        )
        .unwrap();

    let outcome = timeout(TIMEOUT, dispatcher.run_once()).await.unwrap().unwrap();
    assert!(matches!(outcome, DispatchOutcome::Failed { retry_id: None, .. }));
    let q = queue.lock();
    let task = q.get_task(&id).unwrap();
    assert_eq!(task.failure_info.error_type, Some(ErrorType::Timeout));
    assert_eq!(task.error.as_deref(), Some("fatal: timeout: task deadline passed"));
    assert_eq!(q.get_lineage(&id).len(), 1);
    assert!(q.is_idle());
}

#[tokio::test]
async fn task_deadline_reached_mid_handler_is_not_retried() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let id = queue
        .lock()
        .add_task(
            TaskSpec::new("analysis")
                .with_payload(json!({"outcome": "hang"}))
                .with_deadline(Utc::now() + chrono::Duration::milliseconds(40)),
        )
        .unwrap();

    let summary = timeout(TIMEOUT, dispatcher.drain()).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retried, 0);

    let q = queue.lock();
    assert_eq!(q.get_lineage(&id).len(), 1);
    assert_eq!(
        q.get_task(&id).unwrap().failure_info.error_type,
        Some(ErrorType::Timeout)
    );
}

#[tokio::test]
async fn shutdown_interrupts_idle_polling() {
    let dispatch = DispatchConfig {
        poll_interval: Duration::from_secs(60),
        handler_deadline: None,
    };
    let (_queue, dispatcher) = setup(SchedulerConfig::default(), dispatch);

    let runner = Arc::clone(&dispatcher);
    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(SETTLE).await;

    dispatcher.shutdown_handle().shutdown();
    let summary = timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert_eq!(summary.dispatched, 0);
}

#[tokio::test]
async fn rejected_payload_is_not_classified() {
    let (queue, dispatcher) = setup(SchedulerConfig::default(), fast_config());
    let id = submit(&queue, "analysis", 5, json!({}));

    dispatcher.run_once().await.unwrap();
    let task = queue.lock().get_task(&id).unwrap();
    assert_eq!(task.failure_info.error_type, Some(ErrorType::Unknown));
    assert_eq!(task.error.as_deref(), Some("invalid payload: missing outcome"));
}
