//! Inbound ports
//!
//! Use-case interfaces exposed to the surrounding application.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::approval::ApprovalRequest;
use crate::domain::execution::WorkflowExecution;
use crate::domain::routing::AssignmentResult;
use crate::domain::sla::SlaStatus;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::TriggerEvent;
use crate::error::AutomationError;

/// Workflow execution use cases
#[async_trait]
pub trait WorkflowUseCases: Send + Sync {
    /// Run every active workflow matching the event whose conditions pass.
    /// One execution is created per matching definition.
    async fn execute_triggered_workflows(
        &self,
        event: TriggerEvent,
        lead_id: &EntityId,
        triggered_by: &EntityId,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<Vec<WorkflowExecution>, AutomationError>;

    /// Create an execution and hand the action loop off asynchronously.
    /// Returns as soon as the execution record exists; callers never block
    /// on action completion.
    async fn execute_workflow(
        &self,
        workflow_id: &EntityId,
        lead_id: &EntityId,
        triggered_by: &EntityId,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<WorkflowExecution, AutomationError>;

    /// Request cancellation; the action loop stops before its next step.
    async fn cancel_execution(&self, execution_id: &EntityId)
        -> Result<WorkflowExecution, AutomationError>;
}

/// Lead routing use cases
#[async_trait]
pub trait RoutingUseCases: Send + Sync {
    async fn assign_lead(
        &self,
        lead_id: &EntityId,
        explicit_assignee: Option<&EntityId>,
    ) -> Result<AssignmentResult, AutomationError>;

    async fn reassign_lead(
        &self,
        lead_id: &EntityId,
        new_assignee: &EntityId,
        acting_user: &EntityId,
        reason: &str,
    ) -> Result<AssignmentResult, AutomationError>;
}

/// SLA tracking use cases
#[async_trait]
pub trait SlaUseCases: Send + Sync {
    async fn check_sla_compliance(&self, lead_id: &EntityId) -> Result<SlaStatus, AutomationError>;

    async fn overdue_leads(&self) -> Result<Vec<SlaStatus>, AutomationError>;

    /// Returns the number of leads escalated this sweep
    async fn escalate_overdue_leads(&self) -> Result<u64, AutomationError>;
}

/// Approval decision use cases
#[async_trait]
pub trait ApprovalUseCases: Send + Sync {
    async fn respond_to_approval(
        &self,
        request_id: &EntityId,
        approver: &EntityId,
        approved: bool,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, AutomationError>;
}
