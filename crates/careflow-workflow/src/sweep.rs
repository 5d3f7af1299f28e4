use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::config::{SWEEP_LIMIT_RANGE, SWEEP_MAX_ATTEMPTS_RANGE, SweepConfig, check_range};
use crate::error::{ValidationError, WorkflowError};
use crate::processor::{WorkflowProcessor, failure_message};
use crate::store::{
    CandidateFilter, DomainEventStore, PatientDirectory, ResourceCatalog, RuleSource,
};
use crate::types::{Actor, DomainEvent};

/// Operator request for one recovery batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRequest {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_failed: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_limit() -> u32 {
    25
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for SweepRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            include_failed: false,
            max_attempts: default_max_attempts(),
        }
    }
}

impl SweepRequest {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            limit: config.limit,
            include_failed: config.include_failed,
            max_attempts: config.max_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("limit", self.limit, SWEEP_LIMIT_RANGE)?;
        check_range("max_attempts", self.max_attempts, SWEEP_MAX_ATTEMPTS_RANGE)
    }

    fn filter(&self) -> CandidateFilter {
        CandidateFilter {
            limit: self.limit as usize,
            include_failed: self.include_failed,
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Processed,
    Failed,
    /// Claimed by a concurrent attempt before this sweep reached it
    Skipped,
}

/// Per-event line of a sweep report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    pub event_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
    pub attempts: u32,
    pub fired_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub processed_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    /// Abandoned claims released as failed attempts before selection
    #[serde(default)]
    pub expired_claims: u32,
    pub results: Vec<EventResult>,
}

impl SweepReport {
    fn record(&mut self, result: EventResult) {
        match result.outcome {
            EventOutcome::Processed => self.processed_count += 1,
            EventOutcome::Failed => self.failed_count += 1,
            EventOutcome::Skipped => self.skipped_count += 1,
        }
        self.results.push(result);
    }
}

/// Batch retry of pending (and optionally failed) events
pub struct RecoverySweep<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    processor: Arc<WorkflowProcessor<E, S, P, R>>,
    claim_ttl: Duration,
}

impl<E, S, P, R> RecoverySweep<E, S, P, R>
where
    E: DomainEventStore,
    S: RuleSource,
    P: PatientDirectory,
    R: ResourceCatalog,
{
    /// `claim_ttl` is how long an attempt may hold an event before the
    /// sweep treats it as abandoned.
    pub fn new(processor: Arc<WorkflowProcessor<E, S, P, R>>, claim_ttl: Duration) -> Self {
        Self {
            processor,
            claim_ttl,
        }
    }

    /// Runs one processing attempt on each selected candidate, oldest first.
    ///
    /// A failure on one event is recorded in its result line and never stops
    /// the batch.
    #[instrument(skip(self, actor), fields(actor = %actor.name))]
    pub async fn process_pending(
        &self,
        request: &SweepRequest,
        actor: &Actor,
    ) -> Result<SweepReport, WorkflowError> {
        request.validate()?;

        let mut report = SweepReport {
            expired_claims: self.expire_stale_claims().await?,
            ..Default::default()
        };

        let candidates = self
            .processor
            .events()
            .select_candidates(&request.filter())
            .await?;

        for candidate in candidates {
            let result = self.process_candidate(candidate, actor).await;
            report.record(result);
        }

        info!(
            processed = report.processed_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            expired = report.expired_claims,
            "Recovery sweep finished"
        );
        Ok(report)
    }

    async fn expire_stale_claims(&self) -> Result<u32, WorkflowError> {
        let ttl_ms = i64::try_from(self.claim_ttl.as_millis()).unwrap_or(i64::MAX);
        let ttl = time::Duration::milliseconds(ttl_ms);
        let Some(cutoff) = careflow_core::now_utc().checked_sub(ttl) else {
            return Ok(0);
        };

        let expired = self.processor.events().expire_claims(cutoff).await?;
        for event in &expired {
            warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                attempts = event.attempts,
                "Released abandoned claim"
            );
        }
        Ok(expired.len() as u32)
    }

    async fn process_candidate(&self, candidate: DomainEvent, actor: &Actor) -> EventResult {
        match self.processor.process_event(&candidate.id, actor).await {
            Ok(Some(attempt)) => EventResult {
                event_id: attempt.event.id,
                event_type: attempt.event.event_type,
                outcome: if attempt.failed_rules.is_empty() {
                    EventOutcome::Processed
                } else {
                    EventOutcome::Failed
                },
                attempts: attempt.event.attempts,
                fired_rules: attempt.fired_rules,
                error_message: (!attempt.failed_rules.is_empty())
                    .then(|| failure_message(&attempt.failed_rules)),
            },
            Ok(None) => EventResult {
                event_id: candidate.id,
                event_type: candidate.event_type,
                outcome: EventOutcome::Skipped,
                attempts: candidate.attempts,
                fired_rules: Vec::new(),
                error_message: None,
            },
            Err(e) => {
                let attempts = match self.processor.events().get_event(&candidate.id).await {
                    Ok(Some(stored)) => stored.attempts,
                    _ => candidate.attempts,
                };
                EventResult {
                    event_id: candidate.id,
                    event_type: candidate.event_type,
                    outcome: EventOutcome::Failed,
                    attempts,
                    fired_rules: Vec::new(),
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    /// Runs a sweep every `poll_interval` until `shutdown` turns true or its
    /// sender is dropped.
    pub async fn run(
        &self,
        poll_interval: Duration,
        request: SweepRequest,
        actor: Actor,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(poll_interval);

        info!(
            interval_ms = poll_interval.as_millis() as u64,
            "Recovery sweep loop started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Recovery sweep loop shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.process_pending(&request, &actor).await {
                        error!(error = %e, "Recovery sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: SweepRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, SweepRequest::default());
        assert_eq!(request.limit, 25);
        assert!(!request.include_failed);
        assert_eq!(request.max_attempts, 3);
    }

    #[test]
    fn test_request_ranges() {
        let ok = SweepRequest {
            limit: 200,
            include_failed: true,
            max_attempts: 20,
        };
        assert!(ok.validate().is_ok());

        let too_big = SweepRequest { limit: 201, ..ok };
        assert!(matches!(
            too_big.validate(),
            Err(ValidationError::OutOfRange { field: "limit", .. })
        ));

        let zero_attempts = SweepRequest {
            max_attempts: 0,
            ..ok
        };
        assert!(zero_attempts.validate().is_err());
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = SweepReport::default();
        for outcome in [
            EventOutcome::Processed,
            EventOutcome::Failed,
            EventOutcome::Processed,
            EventOutcome::Skipped,
        ] {
            report.record(EventResult {
                event_id: "e".into(),
                event_type: "checkin.submitted".into(),
                outcome,
                attempts: 1,
                fired_rules: Vec::new(),
                error_message: None,
            });
        }
        assert_eq!(report.processed_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.results.len(), 4);
    }

    #[test]
    fn test_from_config() {
        let config = SweepConfig {
            limit: 50,
            include_failed: true,
            ..Default::default()
        };
        let request = SweepRequest::from_config(&config);
        assert_eq!(request.limit, 50);
        assert!(request.include_failed);
        assert_eq!(request.max_attempts, 3);
    }
}
