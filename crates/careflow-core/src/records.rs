//! Care records produced by workflow actions and the collaborator records
//! they reference.
//!
//! Patients and community resources are owned by other subsystems; the
//! engine only reads them. Alerts, appointments and referrals are written by
//! the action dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::error::CoreError;

/// Clinical alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(CoreError::unknown_variant("alert severity", s)),
        }
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Community resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    MentalHealth,
    FoodSupport,
    Transport,
    Financial,
    Housing,
    ChronicCare,
    Wellness,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::MentalHealth => "mental_health",
            ResourceCategory::FoodSupport => "food_support",
            ResourceCategory::Transport => "transport",
            ResourceCategory::Financial => "financial",
            ResourceCategory::Housing => "housing",
            ResourceCategory::ChronicCare => "chronic_care",
            ResourceCategory::Wellness => "wellness",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mental_health" => Ok(ResourceCategory::MentalHealth),
            "food_support" => Ok(ResourceCategory::FoodSupport),
            "transport" => Ok(ResourceCategory::Transport),
            "financial" => Ok(ResourceCategory::Financial),
            "housing" => Ok(ResourceCategory::Housing),
            "chronic_care" => Ok(ResourceCategory::ChronicCare),
            "wellness" => Ok(ResourceCategory::Wellness),
            _ => Err(CoreError::unknown_variant("resource category", s)),
        }
    }
}

/// Referral progress status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    #[default]
    Recommended,
    Contacted,
    Enrolled,
    Completed,
    Declined,
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferralStatus::Recommended => write!(f, "recommended"),
            ReferralStatus::Contacted => write!(f, "contacted"),
            ReferralStatus::Enrolled => write!(f, "enrolled"),
            ReferralStatus::Completed => write!(f, "completed"),
            ReferralStatus::Declined => write!(f, "declined"),
        }
    }
}

impl FromStr for ReferralStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommended" => Ok(ReferralStatus::Recommended),
            "contacted" => Ok(ReferralStatus::Contacted),
            "enrolled" => Ok(ReferralStatus::Enrolled),
            "completed" => Ok(ReferralStatus::Completed),
            "declined" => Ok(ReferralStatus::Declined),
            _ => Err(CoreError::unknown_variant("referral status", s)),
        }
    }
}

/// Patient as seen by the workflow engine (read-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
}

/// Community support resource (read-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityResource {
    pub id: String,
    pub name: String,
    pub category: ResourceCategory,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Alert raised against a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAlert {
    pub id: String,
    pub patient_id: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub resolved: bool,

    /// Origin of the alert when raised by a workflow rule
    pub event_id: String,
    pub rule_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Follow-up appointment for a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub clinician_name: String,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub status: AppointmentStatus,

    pub event_id: String,
    pub rule_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Referral of a patient to a community resource.
///
/// At most one referral exists per (patient, resource) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReferral {
    pub id: String,
    pub patient_id: String,
    pub resource_id: String,
    pub reason: String,
    pub status: ReferralStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
