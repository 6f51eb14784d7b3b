//! Execution boundary between the scheduler and the code that does the work.

pub mod driver;
pub mod handler;
pub mod registry;

pub use driver::{DispatchConfig, DispatchOutcome, DispatchSummary, Dispatcher, ShutdownHandle};
pub use handler::{EchoHandler, HandlerError, TaskHandler};
pub use registry::{HandlerRegistry, RegistryError};
