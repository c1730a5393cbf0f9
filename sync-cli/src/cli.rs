//! Command-line arguments.

use bridge_traits::log::LogLevel;
use clap::{Parser, Subcommand, ValueEnum};
use core_runtime::config::{AppConfig, ConfigSource};
use core_runtime::logging::{LogFormat, LoggingConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "person-album-sync",
    version,
    about = "Add Immich assets featuring chosen people to albums"
)]
pub struct Cli {
    /// Configuration file, used when the CONFIG environment variable is unset
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sync every configured rule once (default)
    Run(RunArgs),
    /// Print the configured rules and their checkpoint keys
    Rules,
    /// Inspect or reset stored checkpoints
    #[command(subcommand)]
    Checkpoints(CheckpointCommand),
}

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Log matches without adding them or writing checkpoints
    #[arg(long)]
    pub dry_run: bool,

    /// Override sync.maxConcurrentRules
    #[arg(long)]
    pub max_concurrent_rules: Option<usize>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointCommand {
    /// List stored scope keys with their timestamps
    List,
    /// Delete one checkpoint so the rule resyncs its full history
    Reset { scope_key: String },
}

impl Cli {
    /// The selected subcommand, `run` when none was given.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }

    pub fn config_source(&self) -> ConfigSource {
        ConfigSource::from_env(self.config.as_deref())
    }

    /// `RUST_LOG` replaces the level-derived filter when set.
    pub fn logging_config(&self, rust_log: Option<String>) -> LoggingConfig {
        let level = match self.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };

        let mut config = LoggingConfig::default().with_level(level);
        if let Some(format) = self.log_format {
            config = config.with_format(format.into());
        }
        if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
            config = config.with_filter(filter);
        }
        config
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.dry_run {
            config.sync.dry_run = true;
        }
        if let Some(limit) = self.max_concurrent_rules {
            config.sync.max_concurrent_rules = limit;
        }
    }
}
