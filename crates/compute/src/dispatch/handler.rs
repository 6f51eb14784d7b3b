use async_trait::async_trait;
use qflow_core::TaskKind;
use serde_json::Value;

/// Executes the payload of one task kind (or family of kinds).
///
/// Handlers are object-safe, Send + Sync, and async. The error message is
/// what the scheduler classifies to decide on a retry.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Unique handler name.
    fn name(&self) -> &str;

    fn can_handle(&self, kind: &TaskKind) -> bool;

    async fn process(&self, payload: Value) -> Result<Value, HandlerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Reported verbatim, so keywords like "timeout" or "network" drive the retry decision.
    #[error("{0}")]
    Failed(String),
    /// Never retried.
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Returns its payload unchanged. For testing.
pub struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    fn can_handle(&self, _kind: &TaskKind) -> bool {
        true
    }

    async fn process(&self, payload: Value) -> Result<Value, HandlerError> {
        Ok(payload)
    }
}
