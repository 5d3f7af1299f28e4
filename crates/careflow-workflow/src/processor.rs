use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{ActionDispatcher, DispatchContext};
use crate::error::{DispatchError, StorageError};
use crate::registry::RuleRegistry;
use crate::rule::WorkflowRule;
use crate::store::{
    AttemptCommit, AttemptOutcome, DomainEventStore, PatientDirectory, ResourceCatalog,
    RuleSource, SideEffect,
};
use crate::types::{Actor, DomainEvent};

/// A matching rule whose action failed during an attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub rule_id: String,
    pub rule_name: String,
    pub error: DispatchError,
}

/// Outcome of one committed processing attempt
#[derive(Debug, Clone)]
pub struct AttemptResult {
    /// Event as committed
    pub event: DomainEvent,
    /// Names of rules whose action took effect
    pub fired_rules: Vec<String>,
    pub failed_rules: Vec<RuleFailure>,
}

/// Runs a single processing attempt: claim, evaluate, dispatch, commit.
///
/// Shared by the emission gateway and the recovery sweep.
pub struct WorkflowProcessor<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    events: Arc<E>,
    registry: RuleRegistry<S>,
    dispatcher: ActionDispatcher<P, R>,
    rule_timeout: Duration,
}

impl<E, S, P, R> WorkflowProcessor<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    pub fn new(
        events: Arc<E>,
        registry: RuleRegistry<S>,
        dispatcher: ActionDispatcher<P, R>,
        rule_timeout: Duration,
    ) -> Self {
        Self {
            events,
            registry,
            dispatcher,
            rule_timeout,
        }
    }

    pub fn events(&self) -> &Arc<E> {
        &self.events
    }

    /// Attempts to process one event.
    ///
    /// Returns `Ok(None)` if the event could not be claimed because it is
    /// processed or another attempt holds it. Dispatch failures are folded
    /// into the committed event; only storage failures are returned as errors.
    pub async fn process_event(
        &self,
        event_id: &str,
        actor: &Actor,
    ) -> Result<Option<AttemptResult>, StorageError> {
        let Some(event) = self.events.claim_event(event_id).await? else {
            debug!(event_id, "Event not claimable, skipping");
            return Ok(None);
        };
        let Some(claim_id) = event.claim.as_ref().map(|claim| claim.id.clone()) else {
            return Err(StorageError::internal(format!(
                "claimed event '{event_id}' carries no claim"
            )));
        };

        let rules = match self.registry.lookup(&event.event_type).await {
            Ok(rules) => rules,
            Err(e) => {
                self.release(&event.id, &claim_id, &e).await;
                return Err(e);
            }
        };

        let (effects, fired_rules, failed_rules) = self.run_rules(&event, &rules, actor).await;

        let outcome = if failed_rules.is_empty() {
            AttemptOutcome::Processed
        } else {
            AttemptOutcome::Failed {
                error: failure_message(&failed_rules),
            }
        };

        let commit = AttemptCommit {
            event_id: event.id.clone(),
            claim_id: claim_id.clone(),
            outcome,
            effects,
            finished_at: careflow_core::now_utc(),
        };

        let committed = match self.events.commit_attempt(commit).await {
            Ok(committed) => committed,
            Err(e) => {
                if matches!(e, StorageError::ClaimLost { .. }) {
                    warn!(event_id = %event.id, error = %e, "Lost claim before commit");
                } else {
                    self.release(&event.id, &claim_id, &e).await;
                }
                return Err(e);
            }
        };

        if failed_rules.is_empty() {
            info!(
                event_id = %committed.id,
                event_type = %committed.event_type,
                attempts = committed.attempts,
                fired = fired_rules.len(),
                "Domain event processed"
            );
        } else {
            warn!(
                event_id = %committed.id,
                event_type = %committed.event_type,
                attempts = committed.attempts,
                failed = failed_rules.len(),
                retryable = failed_rules.iter().all(|f| f.error.is_transient()),
                "Domain event processing failed"
            );
        }

        Ok(Some(AttemptResult {
            event: committed,
            fired_rules,
            failed_rules,
        }))
    }

    async fn run_rules(
        &self,
        event: &DomainEvent,
        rules: &[WorkflowRule],
        actor: &Actor,
    ) -> (Vec<SideEffect>, Vec<String>, Vec<RuleFailure>) {
        let ctx = DispatchContext {
            event,
            actor,
            now: careflow_core::now_utc(),
        };
        let mut effects = Vec::new();
        let mut fired = Vec::new();
        let mut failed = Vec::new();

        for rule in rules {
            if !rule.condition.evaluate(&event.payload) {
                debug!(event_id = %event.id, rule = %rule.name, "Rule condition not met");
                continue;
            }

            let result = match timeout(self.rule_timeout, self.dispatcher.dispatch(rule, ctx)).await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(self.rule_timeout)),
            };

            match result {
                Ok(effect) => {
                    debug!(event_id = %event.id, rule = %rule.name, "Rule action dispatched");
                    effects.push(effect);
                    fired.push(rule.name.clone());
                }
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        rule = %rule.name,
                        error = %e,
                        "Rule action failed"
                    );
                    failed.push(RuleFailure {
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        error: e,
                    });
                }
            }
        }

        (effects, fired, failed)
    }

    async fn release(&self, event_id: &str, claim_id: &str, cause: &StorageError) {
        error!(event_id, error = %cause, "Storage failure during processing attempt");
        if let Err(e) = self
            .events
            .abandon_claim(event_id, claim_id, &cause.to_string())
            .await
        {
            error!(event_id, error = %e, "Failed to release event claim");
        }
    }
}

/// One-line summary of the rules that failed in an attempt
pub(crate) fn failure_message(failures: &[RuleFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("rule '{}': {}", f.rule_name, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_joins_rules() {
        let failures = vec![
            RuleFailure {
                rule_id: "r1".into(),
                rule_name: "Escalate".into(),
                error: DispatchError::UnknownSubject("p9".into()),
            },
            RuleFailure {
                rule_id: "r2".into(),
                rule_name: "Refer".into(),
                error: DispatchError::NoEligibleResource("housing".into()),
            },
        ];
        assert_eq!(
            failure_message(&failures),
            "rule 'Escalate': Subject 'p9' does not exist; \
             rule 'Refer': No active community resource in category 'housing'"
        );
    }
}
