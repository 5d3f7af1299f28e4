mod cli;
mod commands;
mod config;
mod fixture;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, RulesCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let app_config = config::load_config(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&app_config.logging.level);
    observability::init_tracing(level);

    match &cli.command {
        Commands::Rules(args) => match &args.command {
            RulesCommands::Validate(validate) => {
                commands::rules::validate(&validate.file, &app_config.workflow.rules, format)?;
            }
        },
        Commands::Simulate(args) => {
            commands::simulate::run(args, &app_config, format).await?;
        }
        Commands::Watch(args) => {
            commands::watch::run(args, &app_config, format).await?;
        }
        Commands::DemoRules => {
            commands::rules::demo(format)?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&app_config)?);
        }
    }

    Ok(())
}
