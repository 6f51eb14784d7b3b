//! Priority task queue with a single active slot.
//!
//! Split into focused submodules:
//! - `core`: TaskQueue struct, constructor, queries, and health metrics
//! - `submission`: task submission and score-ordered insertion
//! - `lifecycle`: selection, completion, failure, and retry spawning

mod core;
mod lifecycle;
mod submission;

pub use self::core::{new_shared_queue, SharedTaskQueue, TaskQueue};
