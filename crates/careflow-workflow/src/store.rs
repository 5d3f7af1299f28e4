use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use careflow_core::{
    Appointment, ClinicalAlert, CommunityResource, PatientRecord, ResourceCategory,
    ResourceReferral,
};

use crate::error::StorageError;
use crate::rule::WorkflowRule;
use crate::types::{DomainEvent, EventQuery, EventStats};

/// How a processing attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Processed,
    Failed { error: String },
}

/// Care record written by a successful rule action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    Alert(ClinicalAlert),
    Appointment(Appointment),
    Referral(ResourceReferral),
}

/// Everything one attempt writes, applied as a unit.
#[derive(Debug, Clone)]
pub struct AttemptCommit {
    pub event_id: String,
    /// Claim taken by the attempt; the commit is refused once it is gone
    pub claim_id: String,
    pub outcome: AttemptOutcome,
    /// Upserted by natural key; committed even when the outcome is failed
    pub effects: Vec<SideEffect>,
    pub finished_at: OffsetDateTime,
}

/// Which events a sweep may pick up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateFilter {
    pub limit: usize,
    pub include_failed: bool,
    /// Failed events with this many attempts or more are left alone
    pub max_attempts: u32,
}

impl CandidateFilter {
    pub fn matches(&self, event: &DomainEvent) -> bool {
        use crate::types::EventStatus;
        match event.status {
            EventStatus::Pending => true,
            EventStatus::Failed => self.include_failed && event.attempts < self.max_attempts,
            EventStatus::Processing | EventStatus::Processed => false,
        }
    }
}

/// Durable domain event log with an atomic claim/commit protocol.
///
/// An event is claimed by flipping `pending`/`failed` to `processing` in one
/// step and recording a [`Claim`](crate::types::Claim). Only the holder of
/// that claim may commit or abandon it afterwards. Claims whose holder went
/// away are released by [`expire_claims`](Self::expire_claims).
#[async_trait]
pub trait DomainEventStore: Send + Sync {
    /// Persist a new event
    async fn insert_event(&self, event: &DomainEvent) -> Result<(), StorageError>;

    /// Get an event by ID
    async fn get_event(&self, id: &str) -> Result<Option<DomainEvent>, StorageError>;

    /// Claim an event for processing.
    ///
    /// Returns the event with its new claim set, or `None` when the event is
    /// not claimable (processed or already claimed by another attempt).
    async fn claim_event(&self, id: &str) -> Result<Option<DomainEvent>, StorageError>;

    /// Claimable events ordered by `occurred_at` ascending
    async fn select_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<DomainEvent>, StorageError>;

    /// Apply an attempt's outcome and side effects atomically.
    ///
    /// Increments `attempts`. Fails with `ClaimLost` if the event is no
    /// longer held by `commit.claim_id`.
    async fn commit_attempt(&self, commit: AttemptCommit) -> Result<DomainEvent, StorageError>;

    /// Release a claim without side effects, marking the attempt failed
    async fn abandon_claim(
        &self,
        id: &str,
        claim_id: &str,
        error: &str,
    ) -> Result<(), StorageError>;

    /// Fail every attempt whose claim was taken before `claimed_before`.
    ///
    /// Each expired claim counts as an attempt. Returns the released events.
    async fn expire_claims(
        &self,
        claimed_before: OffsetDateTime,
    ) -> Result<Vec<DomainEvent>, StorageError>;

    /// Events matching a query, newest first
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<DomainEvent>, StorageError>;

    /// Event counts by status
    async fn event_stats(&self) -> Result<EventStats, StorageError>;
}

/// Read access to stored workflow rules
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Every stored rule for an event type, active or not
    async fn rules_for_event_type(&self, event_type: &str)
    -> Result<Vec<WorkflowRule>, StorageError>;
}

/// Read access to the patient directory
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient(&self, id: &str) -> Result<Option<PatientRecord>, StorageError>;
}

/// Read access to the community resource catalog
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Resources in a category, active or not
    async fn resources_in_category(
        &self,
        category: ResourceCategory,
    ) -> Result<Vec<CommunityResource>, StorageError>;
}
