//! Workflow Engine
//!
//! Matches registered workflow definitions against business events and
//! runs their action lists. `execute_workflow` returns as soon as the
//! execution record exists; the action loop runs on a spawned task and
//! its failures are observable only through the persisted record.
//!
//! Within one execution actions run strictly in list order, each fully
//! resolved (including its delay) before the next. Across executions no
//! ordering is guaranteed; two near-simultaneous triggers for the same
//! lead may interleave their side effects.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::actions::ActionExecutor;
use crate::domain::conditions::evaluate;
use crate::domain::execution::{ActionOutcome, ExecutionStatus, WorkflowExecution};
use crate::domain::records::Lead;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::{TriggerEvent, WorkflowDefinition};
use crate::error::AutomationError;
use crate::ports::inbound::WorkflowUseCases;
use crate::ports::outbound::{ExecutionRepository, LeadRepository, WorkflowRepository};

#[derive(Clone)]
pub struct WorkflowEngine {
    workflows: Arc<dyn WorkflowRepository>,
    executions: Arc<dyn ExecutionRepository>,
    leads: Arc<dyn LeadRepository>,
    actions: Arc<ActionExecutor>,
}

impl WorkflowEngine {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        executions: Arc<dyn ExecutionRepository>,
        leads: Arc<dyn LeadRepository>,
        actions: Arc<ActionExecutor>,
    ) -> Self {
        Self {
            workflows,
            executions,
            leads,
            actions,
        }
    }

    /// The asynchronous action loop. Best-effort: a failed action is
    /// recorded and the loop continues; the run only aborts outright when
    /// the lead disappears or cancellation is requested.
    async fn run_actions(self, workflow: WorkflowDefinition, execution_id: EntityId) {
        let mut execution = match self.executions.find_by_id(&execution_id).await {
            Ok(Some(execution)) => execution,
            Ok(None) => {
                warn!(execution = %execution_id, "execution record missing, loop abandoned");
                return;
            }
            Err(e) => {
                warn!(execution = %execution_id, error = %e, "could not load execution");
                return;
            }
        };

        execution.start();
        self.persist(&execution).await;

        for (index, step) in workflow.actions.iter().enumerate() {
            if self.cancellation_requested(&execution_id).await {
                info!(execution = %execution_id, "execution cancelled, stopping action loop");
                return;
            }

            if let Some(minutes) = step.delay_minutes {
                tokio::time::sleep(std::time::Duration::from_secs(minutes * 60)).await;
                if self.cancellation_requested(&execution_id).await {
                    info!(execution = %execution_id, "execution cancelled during delay");
                    return;
                }
            }

            // Fresh snapshot so later actions observe earlier field updates
            let lead = match self.load_lead(&execution.lead_id).await {
                Ok(lead) => lead,
                Err(e) => {
                    execution.fail(e.to_string());
                    self.persist(&execution).await;
                    return;
                }
            };

            let outcome = match self.actions.execute(&step.action, &lead, &execution).await {
                Ok(result) => ActionOutcome::completed(result),
                Err(e) => {
                    warn!(
                        execution = %execution_id,
                        action = step.action.kind(),
                        error = %e,
                        "workflow action failed"
                    );
                    ActionOutcome::failed(e.to_string())
                }
            };

            // Persist after every action so partial progress is observable
            execution.record_outcome(index, outcome);
            self.persist(&execution).await;
        }

        execution.finish();
        self.persist(&execution).await;
        info!(
            execution = %execution_id,
            workflow = %workflow.id,
            status = ?execution.status,
            "workflow execution finished"
        );
    }

    async fn load_lead(&self, lead_id: &EntityId) -> Result<Lead, AutomationError> {
        self.leads
            .find_by_id(lead_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("lead {lead_id} not found")))
    }

    /// Cancellation is driven externally through the stored record
    async fn cancellation_requested(&self, execution_id: &EntityId) -> bool {
        matches!(
            self.executions.find_by_id(execution_id).await,
            Ok(Some(stored)) if stored.status == ExecutionStatus::Cancelled
        )
    }

    async fn persist(&self, execution: &WorkflowExecution) {
        if let Err(e) = self.executions.update(execution).await {
            warn!(execution = %execution.id, error = %e, "failed to persist execution state");
        }
    }
}

#[async_trait]
impl WorkflowUseCases for WorkflowEngine {
    async fn execute_triggered_workflows(
        &self,
        event: TriggerEvent,
        lead_id: &EntityId,
        triggered_by: &EntityId,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<Vec<WorkflowExecution>, AutomationError> {
        let lead = self.load_lead(lead_id).await?;
        let subject = lead.as_subject();

        let mut definitions = self.workflows.find_active_by_event(event).await?;
        // Higher priority runs first; ties by creation order
        definitions.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let mut executions = Vec::new();
        for definition in definitions {
            if !evaluate(&definition.trigger.conditions, &subject, &context) {
                continue;
            }
            match self
                .execute_workflow(&definition.id, lead_id, triggered_by, context.clone())
                .await
            {
                Ok(execution) => executions.push(execution),
                Err(e) => {
                    // One failed start never blocks the remaining definitions
                    warn!(workflow = %definition.id, error = %e, "workflow failed to start");
                }
            }
        }

        debug!(
            event = event.as_str(),
            lead = %lead_id,
            started = executions.len(),
            "trigger processed"
        );
        Ok(executions)
    }

    async fn execute_workflow(
        &self,
        workflow_id: &EntityId,
        lead_id: &EntityId,
        triggered_by: &EntityId,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<WorkflowExecution, AutomationError> {
        let mut workflow = self
            .workflows
            .find_by_id(workflow_id)
            .await?
            .ok_or_else(|| {
                AutomationError::NotFound(format!("workflow {workflow_id} not found"))
            })?;
        if !workflow.active {
            return Err(AutomationError::Validation(format!(
                "workflow '{}' is not active",
                workflow.name
            )));
        }

        let execution = WorkflowExecution::new(
            workflow.id.clone(),
            lead_id.clone(),
            triggered_by.clone(),
            context,
            workflow.actions.len(),
        );

        // Created together with the usage-counter increment; a storage
        // failure here propagates and the run never starts.
        self.executions.insert(&execution).await?;
        workflow.record_execution(Utc::now());
        self.workflows.save(&workflow).await?;

        let engine = self.clone();
        let definition = workflow.clone();
        let execution_id = execution.id.clone();
        tokio::spawn(async move {
            engine.run_actions(definition, execution_id).await;
        });

        Ok(execution)
    }

    async fn cancel_execution(
        &self,
        execution_id: &EntityId,
    ) -> Result<WorkflowExecution, AutomationError> {
        let mut execution = self
            .executions
            .find_by_id(execution_id)
            .await?
            .ok_or_else(|| {
                AutomationError::NotFound(format!("execution {execution_id} not found"))
            })?;
        if !execution.cancel() {
            return Err(AutomationError::Validation(format!(
                "execution {execution_id} is already in a terminal state"
            )));
        }
        self.executions.update(&execution).await?;
        info!(execution = %execution_id, "execution cancellation recorded");
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::routing_engine::RoutingEngine;
    use crate::application::EngineConfig;
    use crate::domain::conditions::{Condition, ConditionOperator};
    use crate::domain::execution::ActionStatus;
    use crate::domain::records::{UserAccount, UserRole};
    use crate::domain::workflow::{Action, ActionStep, Trigger};
    use crate::infrastructure::persistence::{
        FailingEmailService, InMemoryApprovalRepository, InMemoryExecutionRepository,
        InMemoryLeadRepository, InMemoryRuleRepository, InMemoryTaskService,
        InMemoryUserDirectory, InMemoryWorkflowRepository, RecordingActivityLog,
        RecordingEmailService, RecordingNotificationService,
    };
    use crate::ports::outbound::EmailService;
    use serde_json::json;

    struct Harness {
        leads: Arc<InMemoryLeadRepository>,
        users: Arc<InMemoryUserDirectory>,
        tasks: Arc<InMemoryTaskService>,
        notifications: Arc<RecordingNotificationService>,
        emails: Arc<RecordingEmailService>,
        approvals: Arc<InMemoryApprovalRepository>,
        workflows: Arc<InMemoryWorkflowRepository>,
        executions: Arc<InMemoryExecutionRepository>,
        engine: WorkflowEngine,
    }

    fn harness() -> Harness {
        let emails = Arc::new(RecordingEmailService::new());
        harness_with_email(emails.clone(), emails)
    }

    fn failing_harness() -> Harness {
        harness_with_email(
            Arc::new(FailingEmailService::default()),
            Arc::new(RecordingEmailService::new()),
        )
    }

    fn harness_with_email(
        email_port: Arc<dyn EmailService>,
        emails: Arc<RecordingEmailService>,
    ) -> Harness {
        let leads = Arc::new(InMemoryLeadRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let tasks = Arc::new(InMemoryTaskService::new());
        let notifications = Arc::new(RecordingNotificationService::new());
        let approvals = Arc::new(InMemoryApprovalRepository::new());
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
            tasks.clone(),
            notifications.clone(),
            email_port,
            approvals.clone(),
            routing,
            EngineConfig::default(),
        ));
        let engine = WorkflowEngine::new(
            workflows.clone(),
            executions.clone(),
            leads.clone(),
            actions,
        );

        Harness {
            leads,
            users,
            tasks,
            notifications,
            emails,
            approvals,
            workflows,
            executions,
            engine,
        }
    }

    fn assigned_lead(h: &Harness) -> (Lead, UserAccount) {
        let rep = UserAccount::new("sam", "sam@leadflow.dev", UserRole::Sales);
        h.users.insert(rep.clone());
        let mut lead = Lead::new("Acme Corp");
        lead.assigned_to = Some(rep.id.clone());
        lead.assigned_at = Some(Utc::now());
        h.leads.insert(lead.clone());
        (lead, rep)
    }

    fn definition(trigger: Trigger, actions: Vec<ActionStep>) -> WorkflowDefinition {
        WorkflowDefinition::new("Welcome sequence", trigger, actions, EntityId::new())
    }

    fn on_lead_created(conditions: Vec<Condition>) -> Trigger {
        Trigger {
            event: TriggerEvent::LeadCreated,
            conditions,
        }
    }

    async fn await_terminal(h: &Harness, id: &EntityId) -> WorkflowExecution {
        // 10ms paused-clock steps; must cover the longest declared action
        // delay (5 minutes = 30_000 steps), since auto-advance only jumps
        // to the nearest pending timer.
        for _ in 0..50_000 {
            if let Ok(Some(stored)) = h.executions.find_by_id(id).await {
                if stored.is_terminal() {
                    return stored;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("execution {id} never reached a terminal state");
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_starts_matching_definitions_in_priority_order() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);
        let notify = |message: &str| {
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: rep.id.clone(),
                message: message.into(),
            })]
        };

        let low = definition(on_lead_created(vec![]), notify("low")).with_priority(1);
        let high = definition(on_lead_created(vec![]), notify("high")).with_priority(10);
        let filtered = definition(
            on_lead_created(vec![Condition::new(
                "status",
                ConditionOperator::Equals,
                json!("qualified"),
            )]),
            notify("filtered"),
        );
        let mut dormant = definition(on_lead_created(vec![]), notify("dormant"));
        dormant.deactivate();
        for w in [&low, &high, &filtered, &dormant] {
            h.workflows.insert(w.clone());
        }

        let started = h
            .engine
            .execute_triggered_workflows(
                TriggerEvent::LeadCreated,
                &lead.id,
                &rep.id,
                HashMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(started.len(), 2);
        assert_eq!(started[0].workflow_id, high.id);
        assert_eq!(started[1].workflow_id, low.id);

        let stored = h.workflows.find_by_id(&high.id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 1);
        assert!(stored.last_executed_at.is_some());
        let untouched = h.workflows.find_by_id(&filtered.id).await.unwrap().unwrap();
        assert_eq!(untouched.execution_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_lead_gets_email_then_delayed_task() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);

        let workflow = definition(
            on_lead_created(vec![Condition::new(
                "status",
                ConditionOperator::Equals,
                json!("new"),
            )]),
            vec![
                ActionStep::immediate(Action::SendEmail {
                    template_id: "welcome".into(),
                    variables: HashMap::new(),
                }),
                ActionStep::delayed(
                    Action::CreateTask {
                        title: "Follow up".into(),
                        description: None,
                        assignee: None,
                        due_in_hours: None,
                    },
                    5,
                ),
            ],
        );
        h.workflows.insert(workflow.clone());

        let started = h
            .engine
            .execute_triggered_workflows(
                TriggerEvent::LeadCreated,
                &lead.id,
                &rep.id,
                HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(started.len(), 1);
        // returns before the loop runs
        assert_eq!(started[0].status, ExecutionStatus::Pending);

        let finished = await_terminal(&h, &started[0].id).await;
        assert_eq!(finished.status, ExecutionStatus::Completed);
        assert!(finished
            .action_outcomes
            .iter()
            .all(|o| o.status == ActionStatus::Completed));
        assert!(finished.action_outcomes[0].executed_at <= finished.action_outcomes[1].executed_at);

        let sent = h.emails.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template_id, "welcome");

        // task assignee defaults to the lead's owner
        let created = h.tasks.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].assignee, rep.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_is_recorded_and_later_actions_still_run() {
        let h = failing_harness();
        let (lead, rep) = assigned_lead(&h);

        let workflow = definition(
            on_lead_created(vec![]),
            vec![
                ActionStep::immediate(Action::SendEmail {
                    template_id: "welcome".into(),
                    variables: HashMap::new(),
                }),
                ActionStep::immediate(Action::SendNotification {
                    recipient: rep.id.clone(),
                    message: "new lead".into(),
                }),
            ],
        );
        h.workflows.insert(workflow);

        let started = h
            .engine
            .execute_triggered_workflows(
                TriggerEvent::LeadCreated,
                &lead.id,
                &rep.id,
                HashMap::new(),
            )
            .await
            .unwrap();
        let finished = await_terminal(&h, &started[0].id).await;

        assert_eq!(finished.status, ExecutionStatus::Failed);
        assert_eq!(finished.action_outcomes[0].status, ActionStatus::Failed);
        assert!(finished.action_outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("email provider unavailable"));
        assert_eq!(finished.action_outcomes[1].status, ActionStatus::Completed);
        assert_eq!(h.notifications.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_updates_are_visible_to_later_actions() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);

        let workflow = definition(
            on_lead_created(vec![]),
            vec![
                ActionStep::immediate(Action::UpdateField {
                    field: "score".into(),
                    value: json!(75),
                }),
                ActionStep::immediate(Action::SendEmail {
                    template_id: "hot-lead".into(),
                    variables: HashMap::new(),
                }),
            ],
        );
        h.workflows.insert(workflow);

        let started = h
            .engine
            .execute_triggered_workflows(
                TriggerEvent::LeadCreated,
                &lead.id,
                &rep.id,
                HashMap::new(),
            )
            .await
            .unwrap();
        let finished = await_terminal(&h, &started[0].id).await;
        assert_eq!(finished.status, ExecutionStatus::Completed);

        let stored = h.leads.find_by_id(&lead.id).await.unwrap().unwrap();
        assert_eq!(stored.score, 75);
        assert_eq!(h.emails.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_workflow_rejects_missing_and_inactive_definitions() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);

        let err = h
            .engine
            .execute_workflow(&EntityId::new(), &lead.id, &rep.id, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::NotFound(_)));

        let mut workflow = definition(
            on_lead_created(vec![]),
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: rep.id.clone(),
                message: "hi".into(),
            })],
        );
        workflow.deactivate();
        h.workflows.insert(workflow.clone());

        let err = h
            .engine
            .execute_workflow(&workflow.id, &lead.id, &rep.id, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fails_when_lead_disappears() {
        let h = harness();
        let rep = UserAccount::new("sam", "sam@leadflow.dev", UserRole::Sales);
        h.users.insert(rep.clone());

        let workflow = definition(
            on_lead_created(vec![]),
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: rep.id.clone(),
                message: "hi".into(),
            })],
        );
        h.workflows.insert(workflow.clone());

        // lead id that was never stored
        let started = h
            .engine
            .execute_workflow(&workflow.id, &EntityId::new(), &rep.id, HashMap::new())
            .await
            .unwrap();
        let finished = await_terminal(&h, &started.id).await;

        assert_eq!(finished.status, ExecutionStatus::Failed);
        assert!(finished.error.as_deref().unwrap().contains("not found"));
        assert!(h.notifications.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_loop_starts_skips_all_actions() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);

        let workflow = definition(
            on_lead_created(vec![]),
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: rep.id.clone(),
                message: "hi".into(),
            })],
        );
        h.workflows.insert(workflow.clone());

        let started = h
            .engine
            .execute_workflow(&workflow.id, &lead.id, &rep.id, HashMap::new())
            .await
            .unwrap();
        // cancel before yielding to the spawned loop
        let cancelled = h.engine.cancel_execution(&started.id).await.unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let stored = h.executions.find_by_id(&started.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert!(h.notifications.sent().is_empty());

        // a second cancel is rejected, the record is terminal
        let err = h.engine.cancel_execution(&started.id).await.unwrap_err();
        assert!(matches!(err, AutomationError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_remaining_actions() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);

        let workflow = definition(
            on_lead_created(vec![]),
            vec![ActionStep::delayed(
                Action::SendNotification {
                    recipient: rep.id.clone(),
                    message: "hi".into(),
                },
                60,
            )],
        );
        h.workflows.insert(workflow.clone());

        let started = h
            .engine
            .execute_workflow(&workflow.id, &lead.id, &rep.id, HashMap::new())
            .await
            .unwrap();
        // let the loop reach its delay, then cancel
        tokio::task::yield_now().await;
        h.engine.cancel_execution(&started.id).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(61 * 60)).await;
        let stored = h.executions.find_by_id(&started.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert!(h.notifications.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_request_does_not_block_the_run() {
        let h = harness();
        let (lead, rep) = assigned_lead(&h);
        let manager = UserAccount::new("dana", "dana@leadflow.dev", UserRole::Manager);
        h.users.insert(manager.clone());

        let workflow = definition(
            on_lead_created(vec![]),
            vec![ActionStep::immediate(Action::RequestApproval {
                approver_role: UserRole::Manager,
                approver: None,
                expires_in_hours: None,
                request_data: HashMap::new(),
            })],
        );
        h.workflows.insert(workflow);

        let started = h
            .engine
            .execute_triggered_workflows(
                TriggerEvent::LeadCreated,
                &lead.id,
                &rep.id,
                HashMap::new(),
            )
            .await
            .unwrap();
        let finished = await_terminal(&h, &started[0].id).await;

        // run completes while the approval is still pending
        assert_eq!(finished.status, ExecutionStatus::Completed);
        let requests = h.approvals.all();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].effective_status(Utc::now()),
            crate::domain::approval::ApprovalStatus::Pending
        );

        let sent = h.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, manager.id);
        assert_eq!(sent[0].kind, "approval_request");
    }
}
