pub mod algorithms;
pub mod dispatch;
pub mod optimizer;
pub mod scheduler;

pub use algorithms::{analyze, estimate, DependencyAnalysis, ExecutionEstimate};
pub use dispatch::{
    DispatchConfig, Dispatcher, HandlerError, HandlerRegistry, RegistryError, TaskHandler,
};
pub use optimizer::{OptimizationReport, OptimizerConfig, Strategy, WorkflowOptimizer};
pub use scheduler::{
    new_shared_queue, PerformanceSnapshot, QueueHealth, SchedulerConfig, SharedTaskQueue,
    TaskQueue,
};
