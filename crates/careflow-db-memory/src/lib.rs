//! In-memory storage backend for the CareFlow workflow engine.
//!
//! [`InMemoryWorkflowStore`] implements every storage and collaborator trait
//! of `careflow-workflow` behind a single handle, with atomic event claims
//! and atomic commits of an attempt's status and care records.
//!
//! # Example
//!
//! ```ignore
//! use careflow_db_memory::{InMemoryWorkflowStore, create_engine};
//! use careflow_workflow::{Actor, WorkflowConfig, demo_rules};
//!
//! let store = InMemoryWorkflowStore::new();
//! for rule in demo_rules() {
//!     store.upsert_rule(rule, Some("seed")).await?;
//! }
//! let engine = create_engine(store.clone(), WorkflowConfig::default())?;
//! let event = engine
//!     .emit("triage.assessed", "triage.assess", payload, &Actor::system("triage"))
//!     .await?;
//! ```

pub mod catalog;
pub mod storage;

use std::sync::Arc;

use careflow_workflow::{ValidationError, WorkflowConfig, WorkflowEngine};

pub use storage::InMemoryWorkflowStore;

/// Engine running entirely on one in-memory store.
pub type InMemoryEngine = WorkflowEngine<
    InMemoryWorkflowStore,
    InMemoryWorkflowStore,
    InMemoryWorkflowStore,
    InMemoryWorkflowStore,
>;

/// Creates an engine backed by `store`.
///
/// The store is cheap to clone; keep a clone to seed collaborators and manage
/// rules while the engine runs.
pub fn create_engine(
    store: InMemoryWorkflowStore,
    config: WorkflowConfig,
) -> Result<InMemoryEngine, ValidationError> {
    WorkflowEngine::with_backend(Arc::new(store), config)
}
