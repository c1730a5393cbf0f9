//! `person-album-sync` binary.
//!
//! Exit codes: `0` every rule succeeded, `1` the run could not start
//! (configuration, logging or storage), `2` at least one rule failed.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CheckpointCommand, Cli, Command, RunArgs};
use core_runtime::config::AppConfig;
use core_runtime::logging::init_logging;
use core_service::{bootstrap_desktop, build_rules, CoreService};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.logging_config(std::env::var("RUST_LOG").ok())) {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    match execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Sync could not start");
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn execute(cli: &Cli) -> Result<ExitCode> {
    let source = cli.config_source();
    let config = AppConfig::load(&source)
        .with_context(|| format!("loading configuration from {}", source))?;

    match cli.command() {
        Command::Run(args) => run(config, &args).await,
        Command::Rules => {
            for rule in build_rules(&config)? {
                println!("{}\t{}", rule.scope_key(), rule.label());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Checkpoints(command) => {
            let service = open(config).await?;

            match command {
                CheckpointCommand::List => {
                    for (key, value) in service.list_checkpoints().await? {
                        println!("{}\t{}", key, value.unwrap_or_default());
                    }
                }
                CheckpointCommand::Reset { scope_key } => {
                    service.reset_checkpoint(&scope_key).await?;
                    println!("reset {}", scope_key);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(mut config: AppConfig, args: &RunArgs) -> Result<ExitCode> {
    args.apply(&mut config);
    let service = open(config).await?;

    let report = service.run_once().await;
    println!("{}", report);

    Ok(if report.has_failures() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

async fn open(config: AppConfig) -> Result<CoreService> {
    bootstrap_desktop(config)
        .await
        .context("initializing sync service")
}
