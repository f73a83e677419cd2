//! Workflow definitions
//!
//! Declarative automation rules: a trigger (business event + conditions)
//! and an ordered, delayable action list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::conditions::Condition;
use crate::domain::records::UserRole;
use crate::domain::value_objects::EntityId;

/// Business events that can trigger a workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    LeadCreated,
    LeadAssigned,
    ScoreChanged,
    StatusUpdated,
    TaskCompleted,
    Manual,
}

impl TriggerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerEvent::LeadCreated => "lead_created",
            TriggerEvent::LeadAssigned => "lead_assigned",
            TriggerEvent::ScoreChanged => "score_changed",
            TriggerEvent::StatusUpdated => "status_updated",
            TriggerEvent::TaskCompleted => "task_completed",
            TriggerEvent::Manual => "manual",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trigger {
    pub event: TriggerEvent,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// One step of a workflow: the action plus an optional pre-execution delay
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub delay_minutes: Option<u64>,
}

impl ActionStep {
    pub fn immediate(action: Action) -> Self {
        Self {
            action,
            delay_minutes: None,
        }
    }

    pub fn delayed(action: Action, delay_minutes: u64) -> Self {
        Self {
            action,
            delay_minutes: Some(delay_minutes),
        }
    }
}

/// Workflow action, one variant per action kind
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendEmail {
        template_id: String,
        #[serde(default)]
        variables: HashMap<String, serde_json::Value>,
    },
    CreateTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        /// Defaults to the lead's current assignee
        #[serde(default)]
        assignee: Option<EntityId>,
        /// Defaults to 24 hours from execution
        #[serde(default)]
        due_in_hours: Option<i64>,
    },
    UpdateField {
        field: String,
        value: serde_json::Value,
    },
    AssignLead {
        #[serde(default)]
        assignee: Option<EntityId>,
    },
    SendNotification {
        recipient: EntityId,
        message: String,
    },
    RequestApproval {
        approver_role: UserRole,
        #[serde(default)]
        approver: Option<EntityId>,
        /// Defaults to the configured approval expiry
        #[serde(default)]
        expires_in_hours: Option<i64>,
        #[serde(default)]
        request_data: HashMap<String, serde_json::Value>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SendEmail { .. } => "send_email",
            Action::CreateTask { .. } => "create_task",
            Action::UpdateField { .. } => "update_field",
            Action::AssignLead { .. } => "assign_lead",
            Action::SendNotification { .. } => "send_notification",
            Action::RequestApproval { .. } => "request_approval",
        }
    }
}

/// An automation rule: trigger, ordered actions, activation and audit fields
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: EntityId,
    pub name: String,
    pub trigger: Trigger,
    pub actions: Vec<ActionStep>,
    pub active: bool,
    /// Higher runs first among definitions matching the same event
    pub priority: i32,
    pub owner_id: EntityId,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(
        name: impl Into<String>,
        trigger: Trigger,
        actions: Vec<ActionStep>,
        owner_id: EntityId,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            trigger,
            actions,
            active: true,
            priority: 0,
            owner_id,
            last_executed_at: None,
            execution_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// An active workflow must have at least one action
    pub fn validate(&self) -> Result<(), WorkflowDefinitionError> {
        if self.active && self.actions.is_empty() {
            return Err(WorkflowDefinitionError::NoActions);
        }
        Ok(())
    }

    /// Definitions are deactivated, never physically deleted
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Mutated only by the engine after an execution is created
    pub fn record_execution(&mut self, at: DateTime<Utc>) {
        self.execution_count += 1;
        self.last_executed_at = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowDefinitionError {
    #[error("an active workflow must have at least one action")]
    NoActions,
}
