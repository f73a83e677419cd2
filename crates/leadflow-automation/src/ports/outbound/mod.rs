//! Outbound ports
//!
//! Hexagonal architecture: collaborator and repository interfaces the
//! infrastructure must implement. Leads, users, tasks, notifications and
//! email are owned by the surrounding application; workflow definitions,
//! executions, assignment rules and approval requests are this core's
//! own records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalRequest;
use crate::domain::execution::WorkflowExecution;
use crate::domain::records::{Lead, UserAccount, UserRole};
use crate::domain::routing::AssignmentRule;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::{TriggerEvent, WorkflowDefinition};
use crate::error::AutomationError;

/// Lead collaborator port
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Lead>, AutomationError>;

    /// Whole-field update on one lead
    async fn update_field(
        &self,
        id: &EntityId,
        field: &str,
        value: serde_json::Value,
        actor_id: &EntityId,
    ) -> Result<Lead, AutomationError>;

    /// Persist a new assignment (assignee + timestamp)
    async fn assign(
        &self,
        id: &EntityId,
        user_id: &EntityId,
        at: DateTime<Utc>,
    ) -> Result<Lead, AutomationError>;

    /// Leads assigned before the cutoff, for SLA sweeps
    async fn find_assigned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, AutomationError>;

    /// Currently active leads owned by a user, for workload scoring
    async fn count_active_for(&self, user_id: &EntityId) -> Result<u64, AutomationError>;
}

/// User directory port
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<UserAccount>, AutomationError>;

    async fn find_by_role(&self, role: UserRole) -> Result<Vec<UserAccount>, AutomationError>;

    async fn find_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<UserAccount>, AutomationError>;

    /// Manager-role users within a department
    async fn find_managers_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<UserAccount>, AutomationError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTask {
    pub lead_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub assignee: EntityId,
    pub due_at: DateTime<Utc>,
    pub created_by: EntityId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub lead_id: EntityId,
    pub title: String,
    pub assignee: EntityId,
    pub due_at: DateTime<Utc>,
}

/// Task collaborator port
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task, AutomationError>;

    /// Overdue open tasks per user, for workload scoring
    async fn count_overdue_for(&self, user_id: &EntityId) -> Result<u64, AutomationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Assigned,
    Reassigned,
    Escalated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub lead_id: EntityId,
    pub actor_id: Option<EntityId>,
    pub kind: ActivityKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Append-only audit trail port
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<(), AutomationError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: EntityId,
    pub message: String,
    pub kind: String,
    pub related_entity_type: String,
    pub related_entity_id: EntityId,
}

/// Notification delivery port
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), AutomationError>;
}

/// Outbound email port
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_template(
        &self,
        template_id: &str,
        lead_id: &EntityId,
        variables: std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<(), AutomationError>;
}

/// Workflow definition store
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &EntityId,
    ) -> Result<Option<WorkflowDefinition>, AutomationError>;

    async fn find_active_by_event(
        &self,
        event: TriggerEvent,
    ) -> Result<Vec<WorkflowDefinition>, AutomationError>;

    async fn save(&self, workflow: &WorkflowDefinition) -> Result<(), AutomationError>;
}

/// Execution store (append + incremental update, never delete)
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &EntityId,
    ) -> Result<Option<WorkflowExecution>, AutomationError>;

    async fn insert(&self, execution: &WorkflowExecution) -> Result<(), AutomationError>;

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), AutomationError>;
}

/// Assignment rule store
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn find_active(&self) -> Result<Vec<AssignmentRule>, AutomationError>;

    async fn save(&self, rule: &AssignmentRule) -> Result<(), AutomationError>;
}

/// Approval request store
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<ApprovalRequest>, AutomationError>;

    async fn insert(&self, request: &ApprovalRequest) -> Result<(), AutomationError>;

    async fn update(&self, request: &ApprovalRequest) -> Result<(), AutomationError>;
}
