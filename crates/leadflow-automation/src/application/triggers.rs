//! Trigger entry points
//!
//! Thin pass-throughs from lead lifecycle code, task completion code and
//! manual UI actions into the workflow engine. Engine errors are logged
//! and swallowed here so automation failures never abort the primary
//! business operation that raised the event.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::records::LeadStatus;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::TriggerEvent;
use crate::ports::inbound::WorkflowUseCases;

pub struct WorkflowTriggers {
    engine: Arc<dyn WorkflowUseCases>,
}

impl WorkflowTriggers {
    pub fn new(engine: Arc<dyn WorkflowUseCases>) -> Self {
        Self { engine }
    }

    pub async fn on_lead_created(&self, lead_id: &EntityId, actor: &EntityId) {
        self.dispatch(TriggerEvent::LeadCreated, lead_id, actor, HashMap::new())
            .await;
    }

    pub async fn on_lead_assigned(&self, lead_id: &EntityId, actor: &EntityId, assignee: &EntityId) {
        let context = HashMap::from([("assignee".to_string(), json!(assignee))]);
        self.dispatch(TriggerEvent::LeadAssigned, lead_id, actor, context)
            .await;
    }

    pub async fn on_score_changed(
        &self,
        lead_id: &EntityId,
        actor: &EntityId,
        previous_score: u8,
        new_score: u8,
    ) {
        let context = HashMap::from([
            ("previous_score".to_string(), json!(previous_score)),
            ("new_score".to_string(), json!(new_score)),
        ]);
        self.dispatch(TriggerEvent::ScoreChanged, lead_id, actor, context)
            .await;
    }

    pub async fn on_status_updated(
        &self,
        lead_id: &EntityId,
        actor: &EntityId,
        previous_status: LeadStatus,
        new_status: LeadStatus,
    ) {
        let context = HashMap::from([
            ("previous_status".to_string(), json!(previous_status)),
            ("new_status".to_string(), json!(new_status)),
        ]);
        self.dispatch(TriggerEvent::StatusUpdated, lead_id, actor, context)
            .await;
    }

    pub async fn on_task_completed(&self, lead_id: &EntityId, actor: &EntityId, task_id: &EntityId) {
        let context = HashMap::from([("task_id".to_string(), json!(task_id))]);
        self.dispatch(TriggerEvent::TaskCompleted, lead_id, actor, context)
            .await;
    }

    pub async fn trigger_manual(
        &self,
        lead_id: &EntityId,
        actor: &EntityId,
        context: HashMap<String, serde_json::Value>,
    ) {
        self.dispatch(TriggerEvent::Manual, lead_id, actor, context)
            .await;
    }

    async fn dispatch(
        &self,
        event: TriggerEvent,
        lead_id: &EntityId,
        actor: &EntityId,
        mut context: HashMap<String, serde_json::Value>,
    ) {
        context.insert("event".to_string(), json!(event.as_str()));
        match self
            .engine
            .execute_triggered_workflows(event, lead_id, actor, context)
            .await
        {
            Ok(executions) => {
                debug!(
                    event = event.as_str(),
                    lead = %lead_id,
                    started = executions.len(),
                    "trigger dispatched"
                );
            }
            Err(e) => {
                warn!(
                    event = event.as_str(),
                    lead = %lead_id,
                    error = %e,
                    "workflow trigger failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::actions::ActionExecutor;
    use crate::application::routing_engine::RoutingEngine;
    use crate::application::workflow_engine::WorkflowEngine;
    use crate::application::EngineConfig;
    use crate::domain::conditions::{Condition, ConditionOperator};
    use crate::domain::records::{Lead, UserAccount, UserRole};
    use crate::domain::workflow::{Action, ActionStep, Trigger, WorkflowDefinition};
    use crate::ports::outbound::WorkflowRepository;
    use crate::infrastructure::persistence::{
        InMemoryApprovalRepository, InMemoryExecutionRepository, InMemoryLeadRepository,
        InMemoryRuleRepository, InMemoryTaskService, InMemoryUserDirectory,
        InMemoryWorkflowRepository, RecordingActivityLog, RecordingEmailService,
        RecordingNotificationService,
    };

    struct Harness {
        leads: Arc<InMemoryLeadRepository>,
        users: Arc<InMemoryUserDirectory>,
        workflows: Arc<InMemoryWorkflowRepository>,
        triggers: WorkflowTriggers,
    }

    fn harness() -> Harness {
        let leads = Arc::new(InMemoryLeadRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let tasks = Arc::new(InMemoryTaskService::new());
        let workflows = Arc::new(InMemoryWorkflowRepository::new());
        let executions = Arc::new(InMemoryExecutionRepository::new());

        let routing = RoutingEngine::new(
            leads.clone(),
            users.clone(),
            tasks.clone(),
            Arc::new(InMemoryRuleRepository::new()),
            Arc::new(RecordingActivityLog::new()),
        );
        let actions = Arc::new(ActionExecutor::new(
            leads.clone(),
            users.clone(),
            tasks,
            Arc::new(RecordingNotificationService::new()),
            Arc::new(RecordingEmailService::new()),
            Arc::new(InMemoryApprovalRepository::new()),
            routing,
            EngineConfig::default(),
        ));
        let engine = Arc::new(WorkflowEngine::new(
            workflows.clone(),
            executions,
            leads.clone(),
            actions,
        ));

        Harness {
            leads,
            users,
            workflows,
            triggers: WorkflowTriggers::new(engine),
        }
    }

    #[tokio::test]
    async fn test_engine_errors_never_escape_the_trigger() {
        let h = harness();
        // unknown lead: the engine reports not-found, the trigger swallows it
        h.triggers
            .on_lead_created(&EntityId::new(), &EntityId::new())
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_payload_is_available_to_trigger_conditions() {
        let h = harness();
        let rep = UserAccount::new("sam", "sam@leadflow.dev", UserRole::Sales);
        h.users.insert(rep.clone());
        let lead = Lead::new("Acme Corp");
        h.leads.insert(lead.clone());

        // fires only when the event's new score crosses 50
        let workflow = WorkflowDefinition::new(
            "Hot lead alert",
            Trigger {
                event: TriggerEvent::ScoreChanged,
                conditions: vec![Condition::new(
                    "new_score",
                    ConditionOperator::GreaterThan,
                    serde_json::json!(50),
                )],
            },
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: rep.id.clone(),
                message: "lead is hot".into(),
            })],
            EntityId::new(),
        );
        h.workflows.insert(workflow.clone());

        h.triggers
            .on_score_changed(&lead.id, &rep.id, 10, 30)
            .await;
        let stored = h.workflows.find_by_id(&workflow.id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 0);

        h.triggers
            .on_score_changed(&lead.id, &rep.id, 30, 80)
            .await;
        let stored = h.workflows.find_by_id(&workflow.id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 1);
    }
}
