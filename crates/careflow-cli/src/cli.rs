use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "careflow")]
#[command(about = "CareFlow workflow engine operator tooling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./careflow.toml when present)
    #[arg(short, long, global = true, env = "CAREFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides logging.level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Work with rule definition files
    Rules(RulesArgs),
    /// Run a fixture through emission and an optional recovery sweep
    Simulate(SimulateArgs),
    /// Emit a fixture, then keep running the periodic recovery sweep
    Watch(WatchArgs),
    /// Print the built-in demo rule definitions
    DemoRules,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Validate a JSON array of rule definitions
    Validate(ValidateArgs),
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the rules file
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct SimulateArgs {
    /// Path to the fixture file (patients, resources, rules, events)
    pub fixture: PathBuf,
    /// Run one recovery sweep after emitting every event
    #[arg(long)]
    pub sweep: bool,
    /// Sweep batch size (overrides workflow.sweep.limit)
    #[arg(long)]
    pub limit: Option<u32>,
    /// Retry failed events in the sweep
    #[arg(long)]
    pub include_failed: bool,
    /// Attempts after which failed events are left alone
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Path to the fixture file (patients, resources, rules, events)
    pub fixture: PathBuf,
    /// Sweep interval (overrides workflow.sweep.poll_interval_ms)
    #[arg(long)]
    pub interval_ms: Option<u64>,
    /// Retry failed events on each tick
    #[arg(long)]
    pub include_failed: bool,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration_secs: Option<u64>,
}
