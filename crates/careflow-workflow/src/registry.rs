use std::sync::Arc;

use tracing::debug;

use crate::error::StorageError;
use crate::rule::WorkflowRule;
use crate::store::RuleSource;

/// Active rules for an event type, read fresh from the rule source on every lookup.
pub struct RuleRegistry<S: RuleSource> {
    source: Arc<S>,
}

impl<S: RuleSource> RuleRegistry<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Active rules for `event_type`, ordered by `(priority, name)`.
    pub async fn lookup(&self, event_type: &str) -> Result<Vec<WorkflowRule>, StorageError> {
        let mut rules = self.source.rules_for_event_type(event_type).await?;
        rules.retain(|rule| rule.active && rule.event_type == event_type);
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(event_type, count = rules.len(), "Loaded active workflow rules");
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::rule::RuleDefinition;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::RwLock;
    use tokio_test::block_on;

    struct Rules(RwLock<Vec<WorkflowRule>>);

    #[async_trait]
    impl RuleSource for Rules {
        async fn rules_for_event_type(
            &self,
            event_type: &str,
        ) -> Result<Vec<WorkflowRule>, StorageError> {
            Ok(self
                .0
                .read()
                .await
                .iter()
                .filter(|r| r.event_type == event_type)
                .cloned()
                .collect())
        }
    }

    fn rule(name: &str, event_type: &str, priority: u32, active: bool) -> WorkflowRule {
        let def: RuleDefinition = serde_json::from_value(json!({
            "name": name,
            "event_type": event_type,
            "action_type": "create_alert",
            "action_config": {"severity": "high", "title": "t", "message": "m"},
            "priority": priority,
            "active": active
        }))
        .unwrap();
        WorkflowRule::from_definition(def, &RulesConfig::default()).unwrap()
    }

    #[test]
    fn test_lookup_orders_by_priority_then_name() {
        let source = Arc::new(Rules(RwLock::new(vec![
            rule("b-rule", "checkin.submitted", 20, true),
            rule("z-rule", "checkin.submitted", 10, true),
            rule("a-rule", "checkin.submitted", 20, true),
            rule("other", "triage.assessed", 1, true),
        ])));
        let registry = RuleRegistry::new(source);

        let names: Vec<_> = block_on(registry.lookup("checkin.submitted"))
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["z-rule", "a-rule", "b-rule"]);
    }

    #[tokio::test]
    async fn test_lookup_sees_deactivation_immediately() {
        let source = Arc::new(Rules(RwLock::new(vec![rule(
            "escalate",
            "checkin.submitted",
            10,
            true,
        )])));
        let registry = RuleRegistry::new(source.clone());
        assert_eq!(registry.lookup("checkin.submitted").await.unwrap().len(), 1);

        source.0.write().await[0].active = false;
        assert!(registry.lookup("checkin.submitted").await.unwrap().is_empty());
    }
}
