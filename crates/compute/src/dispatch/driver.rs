use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use qflow_core::config::DispatchSettings;
use qflow_core::TaskRecord;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::registry::HandlerRegistry;
use crate::scheduler::SharedTaskQueue;

/// Failure reported for a task whose own deadline has passed. Retries copy the
/// deadline, so it is never retried.
const EXPIRED_DEADLINE: &str = "fatal: timeout: task deadline passed";

fn deadline_passed(task: &TaskRecord) -> bool {
    task.deadline.is_some_and(|at| at <= Utc::now())
}

/// Dispatcher timing knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Sleep between polls when nothing is selectable.
    pub poll_interval: Duration,
    /// Upper bound on one handler call. `None` waits forever.
    pub handler_deadline: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from(&DispatchSettings::default())
    }
}

impl From<&DispatchSettings> for DispatchConfig {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            handler_deadline: settings.handler_deadline_ms.map(Duration::from_millis),
        }
    }
}

/// What happened to one dispatched task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed { task_id: String },
    Failed {
        task_id: String,
        error: String,
        retry_id: Option<String>,
    },
    /// Shutdown arrived mid-handler; the task keeps the active slot.
    Abandoned { task_id: String },
}

/// Counters for one `run` or `drain` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub abandoned: u64,
}

impl DispatchSummary {
    fn record(&mut self, outcome: &DispatchOutcome) {
        self.dispatched += 1;
        match outcome {
            DispatchOutcome::Completed { .. } => self.completed += 1,
            DispatchOutcome::Failed { retry_id, .. } => {
                self.failed += 1;
                if retry_id.is_some() {
                    self.retried += 1;
                }
            }
            DispatchOutcome::Abandoned { .. } => self.abandoned += 1,
        }
    }
}

/// Cloneable stop signal for a running [`Dispatcher`].
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    async fn wait(&self) {
        if !self.is_shutdown() {
            self.notify.notified().await;
        }
    }
}

/// Drives a shared [`TaskQueue`](crate::scheduler::TaskQueue): pull the next
/// task, run its handler, report the result.
///
/// One task runs at a time, matching the queue's single active slot. Without
/// a handler deadline, a handler that never resolves keeps that slot taken
/// until [`TaskQueue::release_active`](crate::scheduler::TaskQueue::release_active)
/// is called.
pub struct Dispatcher {
    queue: SharedTaskQueue,
    registry: Arc<HandlerRegistry>,
    config: DispatchConfig,
    shutdown: ShutdownHandle,
}

impl Dispatcher {
    pub fn new(queue: SharedTaskQueue, registry: Arc<HandlerRegistry>, config: DispatchConfig) -> Self {
        Self {
            queue,
            registry,
            config,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn queue(&self) -> SharedTaskQueue {
        Arc::clone(&self.queue)
    }

    /// Get a handle for external shutdown signaling.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        info!("Dispatcher shutdown requested");
        self.shutdown.shutdown();
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self) -> DispatchSummary {
        self.run_loop(false).await
    }

    /// Run until the queue is idle (nothing pending, nothing active) or
    /// shutdown is signaled.
    pub async fn drain(&self) -> DispatchSummary {
        self.run_loop(true).await
    }

    async fn run_loop(&self, drain: bool) -> DispatchSummary {
        info!(
            handlers = self.registry.len(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            drain,
            "Dispatcher starting"
        );
        let mut summary = DispatchSummary::default();

        while !self.shutdown.is_shutdown() {
            if drain && self.queue.lock().is_idle() {
                break;
            }
            match self.run_once().await {
                Some(outcome) => {
                    let abandoned = matches!(outcome, DispatchOutcome::Abandoned { .. });
                    summary.record(&outcome);
                    if abandoned {
                        break;
                    }
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = self.shutdown.wait() => {}
                    }
                }
            }
        }

        info!(
            dispatched = summary.dispatched,
            completed = summary.completed,
            failed = summary.failed,
            retried = summary.retried,
            "Dispatcher stopped"
        );
        summary
    }

    /// Dispatch at most one task. `None` when nothing was selectable.
    pub async fn run_once(&self) -> Option<DispatchOutcome> {
        let task = self.queue.lock().get_next_task()?;

        let Some(handler) = self.registry.resolve(&task.kind) else {
            let message = format!("fatal: no handler registered for type '{}'", task.kind);
            return Some(self.report_failure(&task, message));
        };

        if deadline_passed(&task) {
            return Some(self.report_failure(&task, EXPIRED_DEADLINE.to_string()));
        }

        debug!(task_id = %task.id, handler = handler.name(), "Dispatching task");
        let deadline = self.effective_deadline(&task);
        let call = handler.process(task.payload.clone());

        let result = tokio::select! {
            result = async {
                match deadline {
                    Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| limit),
                    None => Ok(call.await),
                }
            } => result,
            _ = self.shutdown.wait() => {
                warn!(task_id = %task.id, "Shutdown during handler call, leaving task active");
                return Some(DispatchOutcome::Abandoned { task_id: task.id });
            }
        };

        match result {
            Ok(Ok(value)) => {
                let recorded = self.queue.lock().complete_task(&task.id, value);
                if let Err(e) = recorded {
                    warn!(task_id = %task.id, error = %e, "Could not record completion");
                }
                Some(DispatchOutcome::Completed { task_id: task.id })
            }
            Ok(Err(e)) => Some(self.report_failure(&task, e.to_string())),
            Err(limit) if self.task_deadline_binds(limit) => {
                Some(self.report_failure(&task, EXPIRED_DEADLINE.to_string()))
            }
            Err(limit) => {
                let message = format!(
                    "timeout: handler '{}' exceeded {}ms",
                    handler.name(),
                    limit.as_millis()
                );
                Some(self.report_failure(&task, message))
            }
        }
    }

    /// The sooner of the task's own deadline and the handler deadline.
    fn effective_deadline(&self, task: &TaskRecord) -> Option<Duration> {
        let task_limit = task.deadline.map(|at| {
            (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        });
        match (task_limit, self.config.handler_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether a timeout of `limit` came from the task's deadline rather
    /// than the handler deadline.
    fn task_deadline_binds(&self, limit: Duration) -> bool {
        self.config.handler_deadline.map_or(true, |h| limit < h)
    }

    fn report_failure(&self, task: &TaskRecord, error: String) -> DispatchOutcome {
        let recorded = self.queue.lock().fail_task(&task.id, &error);
        let retry_id = match recorded {
            Ok(retry_id) => retry_id,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Could not record failure");
                None
            }
        };
        DispatchOutcome::Failed {
            task_id: task.id.clone(),
            error,
            retry_id,
        }
    }
}
