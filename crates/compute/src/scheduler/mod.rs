//! Priority scheduler with a single active slot and bounded retries.
//!
//! Submitted tasks are scored and kept in a descending queue. A caller pulls
//! one task at a time with [`TaskQueue::get_next_task`], which picks among the
//! first few entries by a selection score that favors short work. Failures are
//! classified from their message and recoverable ones come back as a new
//! attempt with a small priority boost.

pub mod metrics;
pub mod queue;
pub mod retry;
pub mod scoring;
pub mod types;

pub use metrics::{MetricsAggregator, PerformanceSnapshot};
pub use queue::{new_shared_queue, SharedTaskQueue, TaskQueue};
pub use retry::{classify, FailureClassification, GiveUpReason, RetryDecision, RetryPolicy};
pub use scoring::PriorityScorer;
pub use types::{QueueHealth, SchedulerConfig, ScoringConfig};
