//! Payload fields published by the collaborating subsystems, per event type.
//!
//! Template placeholders on rules for these event types are checked against
//! this table when the rule is authored. Event types not listed here carry
//! no contract and accept any placeholder.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadContract {
    pub event_type: &'static str,
    pub fields: &'static [&'static str],
}

impl PayloadContract {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

pub const PAYLOAD_CONTRACTS: &[PayloadContract] = &[
    PayloadContract {
        event_type: "triage.assessed",
        fields: &[
            "assessment_id",
            "patient_id",
            "age",
            "risk_score",
            "risk_level",
            "recommended_action",
            "alert_id",
        ],
    },
    PayloadContract {
        event_type: "checkin.submitted",
        fields: &[
            "checkin_id",
            "patient_id",
            "patient_age",
            "symptom_severity",
            "mood_score",
            "medication_taken",
            "systolic_bp",
            "oxygen_saturation",
            "heart_rate",
            "auto_alert_id",
        ],
    },
    PayloadContract {
        event_type: "admission.created",
        fields: &[
            "admission_id",
            "patient_id",
            "patient_age",
            "bed_id",
            "ward_code",
            "reason",
            "status",
        ],
    },
    PayloadContract {
        event_type: "admission.transferred",
        fields: &[
            "admission_id",
            "patient_id",
            "patient_age",
            "from_bed_id",
            "to_bed_id",
            "to_ward_code",
            "reason",
        ],
    },
    PayloadContract {
        event_type: "admission.discharged",
        fields: &[
            "admission_id",
            "patient_id",
            "patient_age",
            "bed_id",
            "summary",
            "status",
        ],
    },
    PayloadContract {
        event_type: "lab_order.completed",
        fields: &[
            "lab_order_id",
            "patient_id",
            "patient_age",
            "priority",
            "result_value",
            "result_summary",
            "status",
        ],
    },
];

pub fn contract_for(event_type: &str) -> Option<&'static PayloadContract> {
    PAYLOAD_CONTRACTS.iter().find(|c| c.event_type == event_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_contract() {
        let contract = contract_for("triage.assessed").unwrap();
        assert!(contract.has_field("risk_level"));
        assert!(!contract.has_field("bmi"));
    }

    #[test]
    fn test_unknown_event_type_has_no_contract() {
        assert!(contract_for("pharmacy.dispensed").is_none());
    }

    #[test]
    fn test_every_contract_names_the_subject() {
        assert!(PAYLOAD_CONTRACTS.iter().all(|c| c.has_field("patient_id")));
    }
}
