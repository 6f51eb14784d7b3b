pub mod config;
pub mod error;
pub mod task;
pub mod workflow;

pub use config::Config;
pub use error::*;
pub use task::*;
pub use workflow::*;
