use thiserror::Error;

#[derive(Error, Debug)]
pub enum QflowError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid state transition for task '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("No task is currently active")]
    NoActiveTask,

    #[error("Unknown optimization strategy: {0}")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, QflowError>;
