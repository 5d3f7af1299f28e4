pub mod condition;
pub mod config;
pub mod contracts;
pub mod demo;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod processor;
pub mod registry;
pub mod rule;
pub mod store;
pub mod sweep;
pub mod template;
pub mod types;

pub use condition::{Clause, ClauseOp, Condition, evaluate};
pub use config::{DispatchConfig, RulesConfig, SweepConfig, WorkflowConfig};
pub use contracts::{PayloadContract, contract_for};
pub use demo::demo_rules;
pub use dispatcher::{ActionDispatcher, DispatchContext};
pub use engine::WorkflowEngine;
pub use error::{DispatchError, StorageError, ValidationError, WorkflowError};
pub use gateway::EmissionGateway;
pub use processor::{AttemptResult, RuleFailure, WorkflowProcessor};
pub use registry::RuleRegistry;
pub use rule::{
    ActionType, AlertAction, AppointmentAction, ReferralAction, RuleAction, RuleDefinition,
    WorkflowRule,
};
pub use store::{
    AttemptCommit, AttemptOutcome, CandidateFilter, DomainEventStore, PatientDirectory,
    ResourceCatalog, RuleSource, SideEffect,
};
pub use sweep::{EventOutcome, EventResult, RecoverySweep, SweepReport, SweepRequest};
pub use template::Template;
pub use types::*;
