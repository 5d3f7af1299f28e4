use std::sync::Arc;

use tokio::sync::watch;

use crate::config::WorkflowConfig;
use crate::dispatcher::ActionDispatcher;
use crate::error::{StorageError, ValidationError, WorkflowError};
use crate::gateway::EmissionGateway;
use crate::processor::{AttemptResult, WorkflowProcessor};
use crate::registry::RuleRegistry;
use crate::store::{DomainEventStore, PatientDirectory, ResourceCatalog, RuleSource};
use crate::sweep::{RecoverySweep, SweepReport, SweepRequest};
use crate::types::{Actor, DomainEvent, EventQuery, EventStats, Payload};

/// Wires the gateway, sweep and processor over one set of backends.
pub struct WorkflowEngine<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    config: WorkflowConfig,
    processor: Arc<WorkflowProcessor<E, S, P, R>>,
    gateway: EmissionGateway<E, S, P, R>,
    sweep: RecoverySweep<E, S, P, R>,
}

impl<B> WorkflowEngine<B, B, B, B>
where
    B: DomainEventStore + RuleSource + PatientDirectory + ResourceCatalog,
{
    /// Engine over a single backend that provides every store.
    pub fn with_backend(backend: Arc<B>, config: WorkflowConfig) -> Result<Self, ValidationError> {
        Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            config,
        )
    }
}

impl<E, S, P, R> WorkflowEngine<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    pub fn new(
        events: Arc<E>,
        rules: Arc<S>,
        patients: Arc<P>,
        resources: Arc<R>,
        config: WorkflowConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;

        let dispatcher =
            ActionDispatcher::new(patients, resources, config.dispatch.subject_field.clone());
        let processor = Arc::new(WorkflowProcessor::new(
            events,
            RuleRegistry::new(rules),
            dispatcher,
            config.dispatch.rule_timeout(),
        ));

        Ok(Self {
            gateway: EmissionGateway::new(processor.clone()),
            sweep: RecoverySweep::new(processor.clone(), config.sweep.claim_ttl()),
            processor,
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn gateway(&self) -> &EmissionGateway<E, S, P, R> {
        &self.gateway
    }

    pub fn sweep(&self) -> &RecoverySweep<E, S, P, R> {
        &self.sweep
    }

    pub async fn emit(
        &self,
        event_type: &str,
        source: &str,
        payload: Payload,
        actor: &Actor,
    ) -> Result<DomainEvent, WorkflowError> {
        self.gateway.emit(event_type, source, payload, actor).await
    }

    /// Processes an event recorded directly in the store (not via `emit`).
    pub async fn process_event(
        &self,
        event_id: &str,
        actor: &Actor,
    ) -> Result<Option<AttemptResult>, StorageError> {
        self.processor.process_event(event_id, actor).await
    }

    pub async fn process_pending(
        &self,
        request: &SweepRequest,
        actor: &Actor,
    ) -> Result<SweepReport, WorkflowError> {
        self.sweep.process_pending(request, actor).await
    }

    /// Sweep request built from the configured defaults.
    pub fn default_sweep_request(&self) -> SweepRequest {
        SweepRequest::from_config(&self.config.sweep)
    }

    /// Runs the periodic sweep with the configured interval and defaults
    /// until `shutdown` is signalled.
    pub async fn run_sweep_loop(&self, actor: Actor, shutdown: watch::Receiver<bool>) {
        self.sweep
            .run(
                self.config.sweep.poll_interval(),
                self.default_sweep_request(),
                actor,
                shutdown,
            )
            .await
    }

    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<DomainEvent>, StorageError> {
        self.processor.events().list_events(query).await
    }

    pub async fn event_stats(&self) -> Result<EventStats, StorageError> {
        self.processor.events().event_stats().await
    }
}
