use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use careflow_core::{
    Appointment, ClinicalAlert, CommunityResource, PatientRecord, ResourceReferral,
};
use careflow_workflow::{
    AttemptCommit, AttemptOutcome, CandidateFilter, DomainEvent, DomainEventStore, EventQuery,
    EventStats, EventStatus, RulesConfig, SideEffect, StorageError, WorkflowRule,
};

/// Event `id` if it is still held by `claim_id`.
fn claimed_event<'a>(
    events: &'a mut HashMap<String, DomainEvent>,
    id: &str,
    claim_id: &str,
) -> Result<&'a mut DomainEvent, StorageError> {
    let event = events
        .get_mut(id)
        .ok_or_else(|| StorageError::not_found("DomainEvent", id))?;
    if !event.is_claimed_by(claim_id) {
        return Err(StorageError::claim_lost(id, event.status.as_str()));
    }
    Ok(event)
}

/// (patient, event, rule): one record per rule firing on an event
pub(crate) type FiringKey = (String, String, String);

/// (patient, resource): one referral per pairing
pub(crate) type ReferralKey = (String, String);

/// Event log and care records guarded by one lock, so an attempt's status
/// change and its effects are applied together.
#[derive(Debug, Default)]
pub(crate) struct RecordState {
    pub(crate) events: HashMap<String, DomainEvent>,
    pub(crate) alerts: HashMap<FiringKey, ClinicalAlert>,
    pub(crate) appointments: HashMap<FiringKey, Appointment>,
    pub(crate) referrals: HashMap<ReferralKey, ResourceReferral>,
}

impl RecordState {
    fn apply(&mut self, effect: SideEffect) {
        match effect {
            SideEffect::Alert(alert) => {
                let key = (
                    alert.patient_id.clone(),
                    alert.event_id.clone(),
                    alert.rule_id.clone(),
                );
                match self.alerts.get_mut(&key) {
                    Some(existing) => {
                        existing.severity = alert.severity;
                        existing.title = alert.title;
                        existing.message = alert.message;
                    }
                    None => {
                        self.alerts.insert(key, alert);
                    }
                }
            }
            SideEffect::Appointment(appointment) => {
                let key = (
                    appointment.patient_id.clone(),
                    appointment.event_id.clone(),
                    appointment.rule_id.clone(),
                );
                match self.appointments.get_mut(&key) {
                    Some(existing) => {
                        existing.clinician_name = appointment.clinician_name;
                        existing.reason = appointment.reason;
                        existing.scheduled_at = appointment.scheduled_at;
                    }
                    None => {
                        self.appointments.insert(key, appointment);
                    }
                }
            }
            SideEffect::Referral(referral) => {
                let key = (referral.patient_id.clone(), referral.resource_id.clone());
                // An existing referral may already have progressed; leave it as is
                self.referrals.entry(key).or_insert(referral);
            }
        }
    }
}

/// In-memory backend for the workflow engine.
///
/// Implements the event store, the rule source and both collaborator
/// directories. Patients and resources are seeded by the caller; rules are
/// managed through the admin methods in [`crate::catalog`].
#[derive(Debug, Clone)]
pub struct InMemoryWorkflowStore {
    pub(crate) records: Arc<RwLock<RecordState>>,
    pub(crate) rules: Arc<RwLock<HashMap<String, WorkflowRule>>>,
    pub(crate) patients: Arc<DashMap<String, PatientRecord>>,
    pub(crate) resources: Arc<DashMap<String, CommunityResource>>,
    pub(crate) rule_options: RulesConfig,
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::with_rule_options(RulesConfig::default())
    }

    /// Store that validates admin-submitted rules with `options`.
    pub fn with_rule_options(options: RulesConfig) -> Self {
        Self {
            records: Arc::new(RwLock::new(RecordState::default())),
            rules: Arc::new(RwLock::new(HashMap::new())),
            patients: Arc::new(DashMap::new()),
            resources: Arc::new(DashMap::new()),
            rule_options: options,
        }
    }

    /// Alerts ordered by creation time
    pub async fn alerts(&self) -> Vec<ClinicalAlert> {
        let guard = self.records.read().await;
        let mut alerts: Vec<_> = guard.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        alerts
    }

    /// Appointments ordered by creation time
    pub async fn appointments(&self) -> Vec<Appointment> {
        let guard = self.records.read().await;
        let mut appointments: Vec<_> = guard.appointments.values().cloned().collect();
        appointments
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        appointments
    }

    /// Referrals ordered by creation time
    pub async fn referrals(&self) -> Vec<ResourceReferral> {
        let guard = self.records.read().await;
        let mut referrals: Vec<_> = guard.referrals.values().cloned().collect();
        referrals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        referrals
    }
}

#[async_trait]
impl DomainEventStore for InMemoryWorkflowStore {
    async fn insert_event(&self, event: &DomainEvent) -> Result<(), StorageError> {
        let mut guard = self.records.write().await;
        if guard.events.contains_key(&event.id) {
            return Err(StorageError::already_exists("DomainEvent", &event.id));
        }
        guard.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Option<DomainEvent>, StorageError> {
        Ok(self.records.read().await.events.get(id).cloned())
    }

    async fn claim_event(&self, id: &str) -> Result<Option<DomainEvent>, StorageError> {
        let mut guard = self.records.write().await;
        let event = guard
            .events
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found("DomainEvent", id))?;

        if !event.status.is_claimable() {
            debug!(event_id = id, status = %event.status, "Claim refused");
            return Ok(None);
        }
        event.begin_attempt(careflow_core::now_utc());
        Ok(Some(event.clone()))
    }

    async fn select_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<DomainEvent>, StorageError> {
        let guard = self.records.read().await;
        let mut candidates: Vec<_> = guard
            .events
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(filter.limit);
        Ok(candidates)
    }

    async fn commit_attempt(&self, commit: AttemptCommit) -> Result<DomainEvent, StorageError> {
        let mut guard = self.records.write().await;
        let event = claimed_event(&mut guard.events, &commit.event_id, &commit.claim_id)?;

        match commit.outcome {
            AttemptOutcome::Processed => event.finish_processed(commit.finished_at),
            AttemptOutcome::Failed { error } => event.finish_failed(&error),
        }
        let committed = event.clone();

        for effect in commit.effects {
            guard.apply(effect);
        }
        Ok(committed)
    }

    async fn abandon_claim(
        &self,
        id: &str,
        claim_id: &str,
        error: &str,
    ) -> Result<(), StorageError> {
        let mut guard = self.records.write().await;
        claimed_event(&mut guard.events, id, claim_id)?.finish_failed(error);
        Ok(())
    }

    async fn expire_claims(
        &self,
        claimed_before: OffsetDateTime,
    ) -> Result<Vec<DomainEvent>, StorageError> {
        let mut guard = self.records.write().await;
        let mut expired = Vec::new();
        for event in guard.events.values_mut() {
            if event.is_claim_stale(claimed_before) {
                event.finish_failed("processing attempt abandoned (claim expired)");
                expired.push(event.clone());
            }
        }
        Ok(expired)
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<DomainEvent>, StorageError> {
        let guard = self.records.read().await;
        let mut events: Vec<_> = guard
            .events
            .values()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = query.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn event_stats(&self) -> Result<EventStats, StorageError> {
        let guard = self.records.read().await;
        let mut stats = EventStats::default();
        for event in guard.events.values() {
            match event.status {
                EventStatus::Pending => stats.pending += 1,
                EventStatus::Processing => stats.processing += 1,
                EventStatus::Processed => stats.processed += 1,
                EventStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
