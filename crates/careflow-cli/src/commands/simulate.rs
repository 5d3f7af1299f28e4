use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use careflow_core::{Appointment, ClinicalAlert, ResourceReferral};
use careflow_db_memory::{InMemoryEngine, InMemoryWorkflowStore, create_engine};
use careflow_workflow::{
    Actor, DomainEvent, EventQuery, EventStats, SweepReport, SweepRequest, demo_rules,
};

use crate::cli::{OutputFormat, SimulateArgs};
use crate::config::AppConfig;
use crate::fixture::{Fixture, load_fixture};
use crate::output::{
    print_alerts, print_appointments, print_events, print_heading, print_json, print_referrals,
    print_sweep_report,
};

pub(crate) const CLI_ACTOR: &str = "careflow-cli";

/// Everything a simulation run produced
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub events: Vec<DomainEvent>,
    pub alerts: Vec<ClinicalAlert>,
    pub appointments: Vec<Appointment>,
    pub referrals: Vec<ResourceReferral>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepReport>,
    pub stats: EventStats,
}

fn sweep_request(config: &AppConfig, args: &SimulateArgs) -> SweepRequest {
    let defaults = SweepRequest::from_config(&config.workflow.sweep);
    SweepRequest {
        limit: args.limit.unwrap_or(defaults.limit),
        include_failed: args.include_failed || defaults.include_failed,
        max_attempts: args.max_attempts.unwrap_or(defaults.max_attempts),
    }
}

/// Seeds an in-memory engine from `fixture` and emits every fixture event.
pub(crate) async fn seed_engine(
    fixture: Fixture,
    config: &AppConfig,
) -> Result<(InMemoryWorkflowStore, InMemoryEngine)> {
    let store = InMemoryWorkflowStore::with_rule_options(config.workflow.rules.clone());
    for patient in fixture.patients {
        store.add_patient(patient);
    }
    for resource in fixture.resources {
        store.add_resource(resource);
    }
    for definition in fixture.rules.unwrap_or_else(demo_rules) {
        let name = definition.name.clone();
        store
            .upsert_rule(definition, Some(CLI_ACTOR))
            .await
            .with_context(|| format!("Rule '{name}' rejected"))?;
    }

    let engine = create_engine(store.clone(), config.workflow.clone())?;
    let actor = Actor::system(CLI_ACTOR);

    for (index, event) in fixture.events.into_iter().enumerate() {
        let emitted = engine
            .emit(&event.event_type, &event.source, event.payload, &actor)
            .await
            .with_context(|| format!("Event #{index} ({}) rejected", event.event_type))?;
        info!(event_id = %emitted.id, status = %emitted.status, "Fixture event emitted");
    }

    Ok((store, engine))
}

pub(crate) async fn collect_report(
    store: &InMemoryWorkflowStore,
    engine: &InMemoryEngine,
    sweep: Option<SweepReport>,
) -> Result<SimulationReport> {
    let mut events = engine.list_events(&EventQuery::default()).await?;
    events.reverse();

    Ok(SimulationReport {
        events,
        alerts: store.alerts().await,
        appointments: store.appointments().await,
        referrals: store.referrals().await,
        sweep,
        stats: engine.event_stats().await?,
    })
}

pub async fn simulate_fixture(
    fixture: Fixture,
    config: &AppConfig,
    sweep: Option<SweepRequest>,
) -> Result<SimulationReport> {
    let (store, engine) = seed_engine(fixture, config).await?;

    let sweep = match sweep {
        Some(request) => Some(
            engine
                .process_pending(&request, &Actor::system(CLI_ACTOR))
                .await?,
        ),
        None => None,
    };

    collect_report(&store, &engine, sweep).await
}

pub(crate) fn print_report(report: &SimulationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            print_heading("Events");
            print_events(&report.events);
            print_heading("Alerts");
            print_alerts(&report.alerts);
            print_heading("Appointments");
            print_appointments(&report.appointments);
            print_heading("Referrals");
            print_referrals(&report.referrals);
            if let Some(sweep) = &report.sweep {
                print_heading("Recovery sweep");
                print_sweep_report(sweep);
            }
        }
    }
    Ok(())
}

pub async fn run(args: &SimulateArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let fixture = load_fixture(&args.fixture)?;
    let sweep = args.sweep.then(|| sweep_request(config, args));
    let report = simulate_fixture(fixture, config, sweep).await?;
    print_report(&report, format)
}
