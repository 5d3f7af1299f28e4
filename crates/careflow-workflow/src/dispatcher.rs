use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use careflow_core::{Appointment, AppointmentStatus, ClinicalAlert, ResourceReferral};

use crate::error::DispatchError;
use crate::rule::{AlertAction, AppointmentAction, ReferralAction, RuleAction, WorkflowRule};
use crate::store::{PatientDirectory, ResourceCatalog, SideEffect};
use crate::types::{Actor, DomainEvent, payload_value};

/// Inputs shared by every rule dispatched for one event attempt
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub event: &'a DomainEvent,
    pub actor: &'a Actor,
    /// Clock reading taken once per attempt
    pub now: OffsetDateTime,
}

/// Executes a rule's action against an event, producing the care record to write.
///
/// Dispatch only builds records; persisting them is left to the event store
/// commit so that the event status and its effects land together.
pub struct ActionDispatcher<P, R>
where
    P: PatientDirectory,
    R: ResourceCatalog,
{
    patients: Arc<P>,
    resources: Arc<R>,
    subject_field: String,
}

impl<P, R> ActionDispatcher<P, R>
where
    P: PatientDirectory,
    R: ResourceCatalog,
{
    pub fn new(patients: Arc<P>, resources: Arc<R>, subject_field: impl Into<String>) -> Self {
        Self {
            patients,
            resources,
            subject_field: subject_field.into(),
        }
    }

    pub async fn dispatch(
        &self,
        rule: &WorkflowRule,
        ctx: DispatchContext<'_>,
    ) -> Result<SideEffect, DispatchError> {
        let patient_id = self.resolve_subject(ctx.event).await?;

        match &rule.action {
            RuleAction::CreateAlert(action) => {
                self.create_alert(rule, action, &patient_id, ctx).map(SideEffect::Alert)
            }
            RuleAction::CreateAppointment(action) => self
                .create_appointment(rule, action, &patient_id, ctx)
                .map(SideEffect::Appointment),
            RuleAction::CreateReferral(action) => self
                .create_referral(action, &patient_id, ctx)
                .await
                .map(SideEffect::Referral),
        }
    }

    async fn resolve_subject(&self, event: &DomainEvent) -> Result<String, DispatchError> {
        let id = match payload_value(&event.payload, &self.subject_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(other) => {
                return Err(DispatchError::SubjectLookup(format!(
                    "payload field '{}' is not an id: {other}",
                    self.subject_field
                )));
            }
            None => return Err(DispatchError::MissingSubject(self.subject_field.clone())),
        };

        let patient = self
            .patients
            .find_patient(&id)
            .await
            .map_err(|e| DispatchError::SubjectLookup(e.to_string()))?
            .ok_or_else(|| DispatchError::UnknownSubject(id.clone()))?;

        Ok(patient.id)
    }

    fn create_alert(
        &self,
        rule: &WorkflowRule,
        action: &AlertAction,
        patient_id: &str,
        ctx: DispatchContext<'_>,
    ) -> Result<ClinicalAlert, DispatchError> {
        Ok(ClinicalAlert {
            id: careflow_core::generate_id(),
            patient_id: patient_id.to_string(),
            severity: action.severity,
            title: action.title.render(&ctx.event.payload)?,
            message: action.message.render(&ctx.event.payload)?,
            resolved: false,
            event_id: ctx.event.id.clone(),
            rule_id: rule.id.clone(),
            created_by: Some(ctx.actor.attribution()),
            created_at: ctx.now,
        })
    }

    fn create_appointment(
        &self,
        rule: &WorkflowRule,
        action: &AppointmentAction,
        patient_id: &str,
        ctx: DispatchContext<'_>,
    ) -> Result<Appointment, DispatchError> {
        let scheduled_at = careflow_core::add_hours(ctx.now, action.scheduled_in_hours)
            .ok_or_else(|| {
                DispatchError::InvalidSchedule(format!(
                    "{} hours from {}",
                    action.scheduled_in_hours, ctx.now
                ))
            })?;

        Ok(Appointment {
            id: careflow_core::generate_id(),
            patient_id: patient_id.to_string(),
            clinician_name: action.clinician_name.clone(),
            reason: action.reason.render(&ctx.event.payload)?,
            scheduled_at,
            status: AppointmentStatus::Scheduled,
            event_id: ctx.event.id.clone(),
            rule_id: rule.id.clone(),
            created_by: Some(ctx.actor.attribution()),
            created_at: ctx.now,
        })
    }

    async fn create_referral(
        &self,
        action: &ReferralAction,
        patient_id: &str,
        ctx: DispatchContext<'_>,
    ) -> Result<ResourceReferral, DispatchError> {
        // Render first so a bad template never depends on catalog state
        let reason = action.reason.render(&ctx.event.payload)?;

        let mut candidates = self
            .resources
            .resources_in_category(action.resource_category)
            .await
            .map_err(|e| DispatchError::ResourceLookup(e.to_string()))?;
        candidates.retain(|r| r.active && r.category == action.resource_category);
        candidates.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let resource = candidates.into_iter().next().ok_or_else(|| {
            DispatchError::NoEligibleResource(action.resource_category.as_str().to_string())
        })?;

        Ok(ResourceReferral {
            id: careflow_core::generate_id(),
            patient_id: patient_id.to_string(),
            resource_id: resource.id,
            reason,
            status: action.status,
            referred_by: Some(ctx.actor.attribution()),
            created_at: ctx.now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::error::StorageError;
    use crate::rule::RuleDefinition;
    use crate::types::Payload;
    use async_trait::async_trait;
    use careflow_core::{
        AlertSeverity, CommunityResource, PatientRecord, ReferralStatus, ResourceCategory,
    };
    use serde_json::json;
    use time::macros::datetime;

    struct Fixture {
        patients: Vec<PatientRecord>,
        resources: Vec<CommunityResource>,
    }

    #[async_trait]
    impl PatientDirectory for Fixture {
        async fn find_patient(&self, id: &str) -> Result<Option<PatientRecord>, StorageError> {
            Ok(self.patients.iter().find(|p| p.id == id).cloned())
        }
    }

    #[async_trait]
    impl ResourceCatalog for Fixture {
        async fn resources_in_category(
            &self,
            category: ResourceCategory,
        ) -> Result<Vec<CommunityResource>, StorageError> {
            Ok(self
                .resources
                .iter()
                .filter(|r| r.category == category)
                .cloned()
                .collect())
        }
    }

    fn resource(id: &str, name: &str, active: bool) -> CommunityResource {
        CommunityResource {
            id: id.into(),
            name: name.into(),
            category: ResourceCategory::Wellness,
            active,
        }
    }

    fn dispatcher() -> ActionDispatcher<Fixture, Fixture> {
        let fixture = Arc::new(Fixture {
            patients: vec![PatientRecord {
                id: "p1".into(),
                name: "Ada".into(),
                age: Some(71),
            }],
            resources: vec![
                resource("r3", "Zumba Seniors", true),
                resource("r2", "Active Aging", false),
                resource("r1", "Healthy Living Club", true),
            ],
        });
        ActionDispatcher::new(fixture.clone(), fixture, "patient_id")
    }

    fn rule(value: serde_json::Value) -> WorkflowRule {
        let def: RuleDefinition = serde_json::from_value(value).unwrap();
        WorkflowRule::from_definition(def, &RulesConfig::default()).unwrap()
    }

    fn event(event_type: &str, payload: serde_json::Value) -> DomainEvent {
        let payload: Payload = payload.as_object().cloned().unwrap();
        DomainEvent::new(event_type, "test", payload)
    }

    const NOW: OffsetDateTime = datetime!(2026-03-01 10:00 UTC);

    #[tokio::test]
    async fn test_appointment_dispatch() {
        let rule = rule(json!({
            "name": "follow-up",
            "event_type": "triage.assessed",
            "action_type": "create_appointment",
            "action_config": {
                "clinician_name": "X",
                "scheduled_in_hours": 24,
                "reason": "Follow-up for {risk_level}"
            }
        }));
        let event = event("triage.assessed", json!({"patient_id": "p1", "risk_level": "Critical"}));
        let actor = Actor::user("u1", "Dr. Rivera");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        let SideEffect::Appointment(appt) = dispatcher().dispatch(&rule, ctx).await.unwrap() else {
            panic!("expected appointment");
        };
        assert_eq!(appt.patient_id, "p1");
        assert_eq!(appt.reason, "Follow-up for Critical");
        assert_eq!(appt.scheduled_at, datetime!(2026-03-02 10:00 UTC));
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.event_id, event.id);
        assert_eq!(appt.rule_id, rule.id);
        assert_eq!(appt.created_by.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_unrepresentable_schedule_fails_dispatch() {
        let mut rule = rule(json!({
            "name": "follow-up",
            "event_type": "triage.assessed",
            "action_type": "create_appointment",
            "action_config": {"clinician_name": "X", "scheduled_in_hours": 1}
        }));
        if let RuleAction::CreateAppointment(action) = &mut rule.action {
            action.scheduled_in_hours = 2_562_047_788_015_215.5;
        }
        let event = event("triage.assessed", json!({"patient_id": "p1"}));
        let actor = Actor::system("test");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        let err = dispatcher().dispatch(&rule, ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSchedule(_)), "{err}");
    }

    #[tokio::test]
    async fn test_alert_dispatch_with_numeric_subject() {
        let fixture = Arc::new(Fixture {
            patients: vec![PatientRecord {
                id: "42".into(),
                name: "Bo".into(),
                age: None,
            }],
            resources: vec![],
        });
        let dispatcher = ActionDispatcher::new(fixture.clone(), fixture, "patient_id");
        let rule = rule(json!({
            "name": "escalate",
            "event_type": "checkin.submitted",
            "action_type": "create_alert",
            "action_config": {
                "severity": "critical",
                "title": "Escalation",
                "message": "Patient {patient_id} needs review"
            }
        }));
        let event = event("checkin.submitted", json!({"patient_id": 42}));
        let actor = Actor::system("workflow-sweep");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        let SideEffect::Alert(alert) = dispatcher.dispatch(&rule, ctx).await.unwrap() else {
            panic!("expected alert");
        };
        assert_eq!(alert.patient_id, "42");
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.message, "Patient 42 needs review");
        assert!(!alert.resolved);
        assert_eq!(alert.created_by.as_deref(), Some("workflow-sweep"));
    }

    #[tokio::test]
    async fn test_referral_picks_first_active_by_name() {
        let rule = rule(json!({
            "name": "refer",
            "event_type": "admission.discharged",
            "action_type": "create_referral",
            "action_config": {"resource_category": "wellness", "reason": "Discharge support"}
        }));
        let event = event("admission.discharged", json!({"patient_id": "p1"}));
        let actor = Actor::system("sweep");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        let SideEffect::Referral(referral) = dispatcher().dispatch(&rule, ctx).await.unwrap()
        else {
            panic!("expected referral");
        };
        assert_eq!(referral.resource_id, "r1");
        assert_eq!(referral.status, ReferralStatus::Recommended);
        assert_eq!(referral.reason, "Discharge support");
    }

    #[tokio::test]
    async fn test_referral_without_eligible_resource() {
        let rule = rule(json!({
            "name": "refer",
            "event_type": "admission.discharged",
            "action_type": "create_referral",
            "action_config": {"resource_category": "housing"}
        }));
        let event = event("admission.discharged", json!({"patient_id": "p1"}));
        let actor = Actor::system("sweep");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        let err = dispatcher().dispatch(&rule, ctx).await.unwrap_err();
        assert_eq!(err, DispatchError::NoEligibleResource("housing".into()));
    }

    #[tokio::test]
    async fn test_subject_errors() {
        let rule = rule(json!({
            "name": "escalate",
            "event_type": "checkin.submitted",
            "action_type": "create_alert",
            "action_config": {"severity": "high", "title": "t", "message": "m"}
        }));
        let actor = Actor::system("sweep");

        let missing = event("checkin.submitted", json!({"patient_id": null}));
        let ctx = DispatchContext { event: &missing, actor: &actor, now: NOW };
        assert_eq!(
            dispatcher().dispatch(&rule, ctx).await.unwrap_err(),
            DispatchError::MissingSubject("patient_id".into())
        );

        let unknown = event("checkin.submitted", json!({"patient_id": "p404"}));
        let ctx = DispatchContext { event: &unknown, actor: &actor, now: NOW };
        assert_eq!(
            dispatcher().dispatch(&rule, ctx).await.unwrap_err(),
            DispatchError::UnknownSubject("p404".into())
        );
    }

    #[tokio::test]
    async fn test_missing_template_key_fails_dispatch() {
        let rule = rule(json!({
            "name": "follow-up",
            "event_type": "triage.assessed",
            "action_type": "create_appointment",
            "action_config": {
                "clinician_name": "X",
                "scheduled_in_hours": 1,
                "reason": "Score {risk_score}"
            }
        }));
        let event = event("triage.assessed", json!({"patient_id": "p1"}));
        let actor = Actor::system("sweep");
        let ctx = DispatchContext { event: &event, actor: &actor, now: NOW };

        assert_eq!(
            dispatcher().dispatch(&rule, ctx).await.unwrap_err(),
            DispatchError::MissingTemplateKey("risk_score".into())
        );
    }
}
