//! Built-in starter rules.

use serde_json::json;

use crate::rule::RuleDefinition;

/// Rule definitions seeded into a fresh installation.
pub fn demo_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            id: None,
            name: "High Risk Triage Follow-up".to_string(),
            description: "Book a rapid follow-up when triage scores a patient high or critical risk."
                .to_string(),
            event_type: "triage.assessed".to_string(),
            condition: json!({"all": [
                {"field": "risk_level", "op": "in", "value": ["High", "Critical"]},
                {"field": "patient_id", "op": "exists", "value": true}
            ]}),
            action_type: "create_appointment".to_string(),
            action_config: json!({
                "clinician_name": "Rapid Response Team",
                "scheduled_in_hours": 24,
                "reason": "Automated follow-up for {risk_level} risk score {risk_score}."
            }),
            priority: 10,
            active: true,
        },
        RuleDefinition {
            id: None,
            name: "Critical Check-in Escalation".to_string(),
            description: "Raise a critical alert on severe remote check-in signals.".to_string(),
            event_type: "checkin.submitted".to_string(),
            condition: json!({"any": [
                {"field": "symptom_severity", "op": "gte", "value": 9},
                {"field": "oxygen_saturation", "op": "lt", "value": 90}
            ]}),
            action_type: "create_alert".to_string(),
            action_config: json!({
                "severity": "critical",
                "title": "Critical remote check-in workflow escalation",
                "message": "Auto escalation for patient {patient_id} due to severe remote monitoring signals."
            }),
            priority: 20,
            active: true,
        },
        RuleDefinition {
            id: None,
            name: "Senior Discharge Referral".to_string(),
            description: "Refer discharged seniors to a wellness program.".to_string(),
            event_type: "admission.discharged".to_string(),
            condition: json!({"all": [
                {"field": "patient_age", "op": "gte", "value": 65},
                {"field": "patient_id", "op": "exists", "value": true}
            ]}),
            action_type: "create_referral".to_string(),
            action_config: json!({
                "resource_category": "wellness",
                "reason": "Automated post-discharge support referral for senior patient.",
                "status": "recommended"
            }),
            priority: 30,
            active: true,
        },
    ]
}
