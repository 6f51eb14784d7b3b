use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Task scheduling and workflow optimization toolkit.
///
/// Analyzes and optimizes workflow plans offline, and can drive an
/// in-process scheduler with stub handlers to show queue behavior.
#[derive(Parser, Debug)]
#[command(name = "qflow", about = "Task scheduling and workflow optimization")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Emit compact JSON instead of pretty-printed output
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a workflow plan under a strategy and report the estimated gains
    Optimize {
        /// Plan file: a JSON array of tasks, or an object with a `tasks` array
        #[arg(long, env = "QFLOW_PLAN")]
        plan: PathBuf,

        /// parallel, priority-boost, resource-efficiency, or balanced
        #[arg(long, default_value = "balanced")]
        strategy: String,

        /// Seed for parallel-flag selection (defaults to QFLOW_OPTIMIZER_SEED)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print dependency analysis and execution estimates for a plan
    Analyze {
        #[arg(long, env = "QFLOW_PLAN")]
        plan: PathBuf,
    },

    /// Run generated tasks through the scheduler with stub handlers
    Simulate {
        /// Number of tasks to submit
        #[arg(long, default_value = "20")]
        tasks: usize,

        /// Probability in [0, 1] that a task fails on its first attempt
        #[arg(long, default_value = "0.2")]
        fail_rate: f64,

        /// Seed for task generation (defaults to QFLOW_OPTIMIZER_SEED)
        #[arg(long)]
        seed: Option<u64>,
    },
}
