use std::sync::Arc;

use tracing::{error, instrument};

use crate::error::{ValidationError, WorkflowError};
use crate::processor::WorkflowProcessor;
use crate::store::{DomainEventStore, PatientDirectory, ResourceCatalog, RuleSource};
use crate::types::{Actor, DomainEvent, Payload, validate_payload};

/// Entry point for collaborators: record an event and process it once, inline.
pub struct EmissionGateway<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    processor: Arc<WorkflowProcessor<E, S, P, R>>,
}

impl<E, S, P, R> EmissionGateway<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    pub fn new(processor: Arc<WorkflowProcessor<E, S, P, R>>) -> Self {
        Self { processor }
    }

    /// Persists a pending event and runs one processing attempt on it.
    ///
    /// Only a malformed payload or a failure to persist the event is an
    /// error. Rule failures, and storage failures after the event is
    /// recorded, leave the event `failed` or `pending` for the recovery sweep.
    #[instrument(skip(self, payload, actor), fields(actor = %actor.name))]
    pub async fn emit(
        &self,
        event_type: &str,
        source: &str,
        payload: Payload,
        actor: &Actor,
    ) -> Result<DomainEvent, WorkflowError> {
        if event_type.trim().is_empty() {
            return Err(ValidationError::payload("event_type must not be empty").into());
        }
        validate_payload(&payload)?;

        let event = DomainEvent::new(event_type, source, payload);
        self.processor.events().insert_event(&event).await?;

        match self.processor.process_event(&event.id, actor).await {
            Ok(Some(result)) => Ok(result.event),
            Ok(None) => Ok(self.current(event).await),
            Err(e) => {
                error!(
                    event_id = %event.id,
                    error = %e,
                    "Inline processing failed; left for recovery sweep"
                );
                Ok(self.current(event).await)
            }
        }
    }

    /// Latest stored state of `event`, falling back to the emitted copy.
    async fn current(&self, event: DomainEvent) -> DomainEvent {
        match self.processor.events().get_event(&event.id).await {
            Ok(Some(stored)) => stored,
            _ => event,
        }
    }
}
