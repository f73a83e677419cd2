//! Action dispatch
//!
//! One arm per `Action` variant, each producing a side effect on a named
//! collaborator and returning an opaque result kept only for the audit
//! trail. Failures here are recorded per action by the workflow engine
//! and never abort the run.

use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::routing_engine::RoutingEngine;
use crate::application::EngineConfig;
use crate::domain::approval::ApprovalRequest;
use crate::domain::execution::WorkflowExecution;
use crate::domain::records::Lead;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::Action;
use crate::error::AutomationError;
use crate::ports::outbound::{
    ApprovalRepository, EmailService, LeadRepository, NewTask, Notification, NotificationService,
    TaskService, UserDirectory,
};

pub struct ActionExecutor {
    leads: Arc<dyn LeadRepository>,
    users: Arc<dyn UserDirectory>,
    tasks: Arc<dyn TaskService>,
    notifications: Arc<dyn NotificationService>,
    emails: Arc<dyn EmailService>,
    approvals: Arc<dyn ApprovalRepository>,
    routing: RoutingEngine,
    config: EngineConfig,
}

impl ActionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        users: Arc<dyn UserDirectory>,
        tasks: Arc<dyn TaskService>,
        notifications: Arc<dyn NotificationService>,
        emails: Arc<dyn EmailService>,
        approvals: Arc<dyn ApprovalRepository>,
        routing: RoutingEngine,
        config: EngineConfig,
    ) -> Self {
        Self {
            leads,
            users,
            tasks,
            notifications,
            emails,
            approvals,
            routing,
            config,
        }
    }

    /// Dispatch one action against the current lead snapshot
    pub(crate) async fn execute(
        &self,
        action: &Action,
        lead: &Lead,
        execution: &WorkflowExecution,
    ) -> Result<serde_json::Value, AutomationError> {
        match action {
            Action::SendEmail {
                template_id,
                variables,
            } => self.send_email(template_id, variables, lead, execution).await,
            Action::CreateTask {
                title,
                description,
                assignee,
                due_in_hours,
            } => {
                self.create_task(
                    title,
                    description.clone(),
                    assignee.as_ref(),
                    *due_in_hours,
                    lead,
                    execution,
                )
                .await
            }
            Action::UpdateField { field, value } => {
                self.leads
                    .update_field(&lead.id, field, value.clone(), &execution.triggered_by)
                    .await?;
                Ok(json!({ "field": field, "value": value }))
            }
            Action::AssignLead { assignee } => {
                let result = self
                    .routing
                    .assign_with_reason(&lead.id, assignee.as_ref(), Some("Workflow automation"))
                    .await?;
                serde_json::to_value(&result)
                    .map_err(|e| AutomationError::Repository(e.to_string()))
            }
            Action::SendNotification { recipient, message } => {
                self.notifications
                    .send(Notification {
                        recipient_id: recipient.clone(),
                        message: message.clone(),
                        kind: "workflow".into(),
                        related_entity_type: "lead".into(),
                        related_entity_id: lead.id.clone(),
                    })
                    .await?;
                Ok(json!({ "notified": recipient }))
            }
            Action::RequestApproval {
                approver_role,
                approver,
                expires_in_hours,
                request_data,
            } => {
                self.request_approval(
                    *approver_role,
                    approver.clone(),
                    *expires_in_hours,
                    request_data.clone(),
                    lead,
                    execution,
                )
                .await
            }
        }
    }

    /// Variables are the action parameters merged over the execution context
    async fn send_email(
        &self,
        template_id: &str,
        variables: &HashMap<String, serde_json::Value>,
        lead: &Lead,
        execution: &WorkflowExecution,
    ) -> Result<serde_json::Value, AutomationError> {
        let mut merged = execution.context.clone();
        merged.extend(variables.clone());
        let variable_count = merged.len();
        self.emails
            .send_template(template_id, &lead.id, merged)
            .await?;
        Ok(json!({ "template_id": template_id, "variables": variable_count }))
    }

    async fn create_task(
        &self,
        title: &str,
        description: Option<String>,
        assignee: Option<&EntityId>,
        due_in_hours: Option<i64>,
        lead: &Lead,
        execution: &WorkflowExecution,
    ) -> Result<serde_json::Value, AutomationError> {
        let assignee = assignee
            .cloned()
            .or_else(|| lead.assigned_to.clone())
            .ok_or_else(|| {
                AutomationError::Validation(
                    "task has no assignee and the lead is unassigned".into(),
                )
            })?;
        let due_at =
            Utc::now() + Duration::hours(due_in_hours.unwrap_or(self.config.task_due_offset_hours));

        let task = self
            .tasks
            .create_task(NewTask {
                lead_id: lead.id.clone(),
                title: title.to_string(),
                description,
                assignee,
                due_at,
                created_by: execution.triggered_by.clone(),
            })
            .await?;
        Ok(json!({ "task_id": task.id }))
    }

    /// Creates the request and notifies role holders; completes immediately,
    /// independent of the approval's eventual resolution.
    async fn request_approval(
        &self,
        approver_role: crate::domain::records::UserRole,
        approver: Option<EntityId>,
        expires_in_hours: Option<i64>,
        request_data: HashMap<String, serde_json::Value>,
        lead: &Lead,
        execution: &WorkflowExecution,
    ) -> Result<serde_json::Value, AutomationError> {
        let request = ApprovalRequest::new(
            execution.id.clone(),
            lead.id.clone(),
            execution.triggered_by.clone(),
            approver_role,
            approver,
            request_data,
            expires_in_hours.unwrap_or(self.config.approval_expires_hours),
        );
        self.approvals.insert(&request).await?;

        let holders = self.users.find_by_role(approver_role).await?;
        for user in holders.into_iter().filter(|u| u.active) {
            self.notifications
                .send(Notification {
                    recipient_id: user.id,
                    message: format!("Approval requested for lead '{}'", lead.name),
                    kind: "approval_request".into(),
                    related_entity_type: "lead".into(),
                    related_entity_id: lead.id.clone(),
                })
                .await?;
        }

        Ok(json!({ "approval_request_id": request.id }))
    }
}
