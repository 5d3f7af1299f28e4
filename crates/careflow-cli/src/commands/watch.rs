use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use careflow_workflow::Actor;

use super::simulate::{CLI_ACTOR, SimulationReport, collect_report, print_report, seed_engine};
use crate::cli::{OutputFormat, WatchArgs};
use crate::config::AppConfig;
use crate::fixture::{Fixture, load_fixture};

/// Emits the fixture, then runs the periodic recovery sweep until `shutdown`.
pub async fn watch_fixture(
    fixture: Fixture,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<SimulationReport> {
    let (store, engine) = seed_engine(fixture, config).await?;
    engine
        .run_sweep_loop(Actor::system(CLI_ACTOR), shutdown)
        .await;
    collect_report(&store, &engine, None).await
}

fn watch_config(config: &AppConfig, args: &WatchArgs) -> Result<AppConfig> {
    let mut config = config.clone();
    if let Some(interval_ms) = args.interval_ms {
        config.workflow.sweep.poll_interval_ms = interval_ms;
    }
    if args.include_failed {
        config.workflow.sweep.include_failed = true;
    }
    config.validate()?;
    Ok(config)
}

pub async fn run(args: &WatchArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let config = watch_config(config, args)?;
    let fixture = load_fixture(&args.fixture)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_for = args.duration_secs.map(Duration::from_secs);
    tokio::spawn(async move {
        match run_for {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = tokio::time::sleep(limit) => {}
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    info!(
        interval_ms = config.workflow.sweep.poll_interval_ms,
        "Watching fixture; press Ctrl-C to stop"
    );
    let report = watch_fixture(fixture, &config, shutdown_rx).await?;
    print_report(&report, format)
}
