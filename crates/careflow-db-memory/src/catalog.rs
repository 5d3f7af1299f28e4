//! Rule administration and the read-only collaborator directories.

use async_trait::async_trait;
use tracing::info;

use careflow_core::{CommunityResource, PatientRecord, ResourceCategory};
use careflow_workflow::{
    PatientDirectory, ResourceCatalog, RuleDefinition, RuleSource, StorageError, WorkflowError,
    WorkflowRule,
};

use crate::storage::InMemoryWorkflowStore;

impl InMemoryWorkflowStore {
    /// Creates a rule, or replaces the rule with the definition's `id`.
    ///
    /// Rule names are unique. Replacing keeps the original creation
    /// metadata.
    pub async fn upsert_rule(
        &self,
        definition: RuleDefinition,
        created_by: Option<&str>,
    ) -> Result<WorkflowRule, WorkflowError> {
        let mut rule = WorkflowRule::from_definition(definition, &self.rule_options)?;

        let mut rules = self.rules.write().await;
        if rules
            .values()
            .any(|existing| existing.name == rule.name && existing.id != rule.id)
        {
            return Err(StorageError::already_exists("WorkflowRule", &rule.name).into());
        }

        match rules.get(&rule.id) {
            Some(existing) => {
                rule.created_by = existing.created_by.clone();
                rule.created_at = existing.created_at;
            }
            None => rule.created_by = created_by.map(str::to_string),
        }

        info!(rule_id = %rule.id, rule = %rule.name, active = rule.active, "Workflow rule saved");
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    /// Activates or deactivates a rule; takes effect on the next attempt.
    pub async fn set_rule_active(&self, id: &str, active: bool) -> Result<WorkflowRule, StorageError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found("WorkflowRule", id))?;
        rule.active = active;
        rule.updated_at = careflow_core::now_utc();
        info!(rule_id = id, active, "Workflow rule toggled");
        Ok(rule.clone())
    }

    /// Removes a rule. Returns whether it existed.
    pub async fn delete_rule(&self, id: &str) -> bool {
        self.rules.write().await.remove(id).is_some()
    }

    pub async fn get_rule(&self, id: &str) -> Option<WorkflowRule> {
        self.rules.read().await.get(id).cloned()
    }

    /// All rules, ordered by `(priority, name)`
    pub async fn list_rules(&self) -> Vec<WorkflowRule> {
        let mut rules: Vec<_> = self.rules.read().await.values().cloned().collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        rules
    }

    pub fn add_patient(&self, patient: PatientRecord) {
        self.patients.insert(patient.id.clone(), patient);
    }

    pub fn add_resource(&self, resource: CommunityResource) {
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn set_resource_active(&self, id: &str, active: bool) -> Result<(), StorageError> {
        let mut resource = self
            .resources
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found("CommunityResource", id))?;
        resource.active = active;
        Ok(())
    }
}

#[async_trait]
impl RuleSource for InMemoryWorkflowStore {
    async fn rules_for_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<WorkflowRule>, StorageError> {
        Ok(self
            .rules
            .read()
            .await
            .values()
            .filter(|rule| rule.event_type == event_type)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PatientDirectory for InMemoryWorkflowStore {
    async fn find_patient(&self, id: &str) -> Result<Option<PatientRecord>, StorageError> {
        Ok(self.patients.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryWorkflowStore {
    async fn resources_in_category(
        &self,
        category: ResourceCategory,
    ) -> Result<Vec<CommunityResource>, StorageError> {
        Ok(self
            .resources
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
