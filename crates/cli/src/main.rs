mod cli;
mod commands;
mod simulate;

use anyhow::Result;
use clap::Parser;
use qflow_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = Config::from_env();
    config.log_summary();

    let output = match args.command {
        Command::Optimize { plan, strategy, seed } => {
            let seed = seed.unwrap_or(config.optimizer.seed);
            let report = commands::optimize(&plan, &strategy, seed)?;
            commands::render(&report, args.compact)?
        }
        Command::Analyze { plan } => {
            let analysis = commands::analyze_plan(&plan)?;
            commands::render(&analysis, args.compact)?
        }
        Command::Simulate { tasks, fail_rate, seed } => {
            let seed = seed.unwrap_or(config.optimizer.seed);
            let report = simulate::simulate(tasks, fail_rate, seed, &config).await?;
            commands::render(&report, args.compact)?
        }
    };

    println!("{output}");
    Ok(())
}
