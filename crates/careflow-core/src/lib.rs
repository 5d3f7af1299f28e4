pub mod error;
pub mod id;
pub mod records;
pub mod time;

pub use error::CoreError;
pub use id::generate_id;
pub use records::{
    AlertSeverity, Appointment, AppointmentStatus, ClinicalAlert, CommunityResource,
    PatientRecord, ReferralStatus, ResourceCategory, ResourceReferral,
};
pub use self::time::{add_hours, now_utc};
