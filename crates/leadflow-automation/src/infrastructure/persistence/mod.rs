//! In-memory port implementations for testing
//!
//! DashMap-backed stores for the record types, plus recording fakes for
//! the side-effect collaborators so tests can assert on what was sent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;

use crate::domain::approval::ApprovalRequest;
use crate::domain::execution::WorkflowExecution;
use crate::domain::records::{Lead, LeadStatus, UserAccount, UserRole};
use crate::domain::routing::AssignmentRule;
use crate::domain::value_objects::EntityId;
use crate::domain::workflow::{TriggerEvent, WorkflowDefinition};
use crate::error::AutomationError;
use crate::ports::outbound::{
    ActivityEntry, ActivityLog, ApprovalRepository, EmailService, ExecutionRepository,
    LeadRepository, NewTask, Notification, NotificationService, RuleRepository, Task, TaskService,
    UserDirectory, WorkflowRepository,
};

fn repo_err(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Repository(e.to_string())
}

/// In-memory lead store
#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: DashMap<String, Lead>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lead: Lead) {
        self.leads.insert(lead.id.to_string(), lead);
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Lead>, AutomationError> {
        Ok(self.leads.get(id.as_str()).map(|l| l.clone()))
    }

    async fn update_field(
        &self,
        id: &EntityId,
        field: &str,
        value: serde_json::Value,
        _actor_id: &EntityId,
    ) -> Result<Lead, AutomationError> {
        let mut entry = self
            .leads
            .get_mut(id.as_str())
            .ok_or_else(|| AutomationError::NotFound(format!("lead {id} not found")))?;

        let mut as_json = serde_json::to_value(&*entry).map_err(repo_err)?;
        if as_json.get(field).is_some() {
            as_json[field] = value;
            *entry = serde_json::from_value(as_json).map_err(repo_err)?;
        } else {
            entry.custom_fields.insert(field.to_string(), value);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn assign(
        &self,
        id: &EntityId,
        user_id: &EntityId,
        at: DateTime<Utc>,
    ) -> Result<Lead, AutomationError> {
        let mut entry = self
            .leads
            .get_mut(id.as_str())
            .ok_or_else(|| AutomationError::NotFound(format!("lead {id} not found")))?;
        entry.assigned_to = Some(user_id.clone());
        entry.assigned_at = Some(at);
        entry.updated_at = at;
        Ok(entry.clone())
    }

    async fn find_assigned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, AutomationError> {
        Ok(self
            .leads
            .iter()
            .filter(|l| l.assigned_at.map(|at| at < cutoff).unwrap_or(false))
            .map(|l| l.clone())
            .collect())
    }

    async fn count_active_for(&self, user_id: &EntityId) -> Result<u64, AutomationError> {
        Ok(self
            .leads
            .iter()
            .filter(|l| {
                l.assigned_to.as_ref() == Some(user_id)
                    && !matches!(l.status, LeadStatus::Converted | LeadStatus::Unqualified)
            })
            .count() as u64)
    }
}

/// In-memory user directory; preserves insertion order so round-robin
/// tie-breaking is repeatable.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<UserAccount>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserAccount) {
        self.users.write().unwrap().push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<UserAccount>, AutomationError> {
        let users = self.users.read().map_err(repo_err)?;
        Ok(users.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_role(&self, role: UserRole) -> Result<Vec<UserAccount>, AutomationError> {
        let users = self.users.read().map_err(repo_err)?;
        Ok(users.iter().filter(|u| u.role == role).cloned().collect())
    }

    async fn find_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<UserAccount>, AutomationError> {
        let users = self.users.read().map_err(repo_err)?;
        Ok(users
            .iter()
            .filter(|u| u.department.as_deref() == Some(department))
            .cloned()
            .collect())
    }

    async fn find_managers_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<UserAccount>, AutomationError> {
        let users = self.users.read().map_err(repo_err)?;
        Ok(users
            .iter()
            .filter(|u| {
                u.role == UserRole::Manager && u.department.as_deref() == Some(department)
            })
            .cloned()
            .collect())
    }
}

/// In-memory task collaborator with settable overdue counts
#[derive(Default)]
pub struct InMemoryTaskService {
    created: RwLock<Vec<Task>>,
    overdue: DashMap<String, u64>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_overdue(&self, user_id: &EntityId, count: u64) {
        self.overdue.insert(user_id.to_string(), count);
    }

    pub fn created(&self) -> Vec<Task> {
        self.created.read().unwrap().clone()
    }
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn create_task(&self, task: NewTask) -> Result<Task, AutomationError> {
        let created = Task {
            id: EntityId::new(),
            lead_id: task.lead_id,
            title: task.title,
            assignee: task.assignee,
            due_at: task.due_at,
        };
        self.created.write().map_err(repo_err)?.push(created.clone());
        Ok(created)
    }

    async fn count_overdue_for(&self, user_id: &EntityId) -> Result<u64, AutomationError> {
        Ok(self
            .overdue
            .get(user_id.as_str())
            .map(|c| *c)
            .unwrap_or(0))
    }
}

/// Recording audit trail
#[derive(Default)]
pub struct RecordingActivityLog {
    entries: RwLock<Vec<ActivityEntry>>,
}

impl RecordingActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl ActivityLog for RecordingActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<(), AutomationError> {
        self.entries.write().map_err(repo_err)?.push(entry);
        Ok(())
    }
}

/// Recording notification collaborator
#[derive(Default)]
pub struct RecordingNotificationService {
    sent: RwLock<Vec<Notification>>,
}

impl RecordingNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn send(&self, notification: Notification) -> Result<(), AutomationError> {
        self.sent.write().map_err(repo_err)?.push(notification);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SentEmail {
    pub template_id: String,
    pub lead_id: EntityId,
    pub variables: std::collections::HashMap<String, serde_json::Value>,
}

/// Recording email collaborator
#[derive(Default)]
pub struct RecordingEmailService {
    sent: RwLock<Vec<SentEmail>>,
}

impl RecordingEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl EmailService for RecordingEmailService {
    async fn send_template(
        &self,
        template_id: &str,
        lead_id: &EntityId,
        variables: std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<(), AutomationError> {
        self.sent.write().map_err(repo_err)?.push(SentEmail {
            template_id: template_id.to_string(),
            lead_id: lead_id.clone(),
            variables,
        });
        Ok(())
    }
}

/// Email collaborator that always fails, for best-effort action tests
#[derive(Default)]
pub struct FailingEmailService;

#[async_trait]
impl EmailService for FailingEmailService {
    async fn send_template(
        &self,
        _template_id: &str,
        _lead_id: &EntityId,
        _variables: std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<(), AutomationError> {
        Err(AutomationError::Repository("email provider unavailable".into()))
    }
}

/// In-memory workflow definition store
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: DashMap<String, WorkflowDefinition>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, workflow: WorkflowDefinition) {
        self.workflows.insert(workflow.id.to_string(), workflow);
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_by_id(
        &self,
        id: &EntityId,
    ) -> Result<Option<WorkflowDefinition>, AutomationError> {
        Ok(self.workflows.get(id.as_str()).map(|w| w.clone()))
    }

    async fn find_active_by_event(
        &self,
        event: TriggerEvent,
    ) -> Result<Vec<WorkflowDefinition>, AutomationError> {
        Ok(self
            .workflows
            .iter()
            .filter(|w| w.active && w.trigger.event == event)
            .map(|w| w.clone())
            .collect())
    }

    async fn save(&self, workflow: &WorkflowDefinition) -> Result<(), AutomationError> {
        self.workflows
            .insert(workflow.id.to_string(), workflow.clone());
        Ok(())
    }
}

/// In-memory execution store
#[derive(Default)]
pub struct InMemoryExecutionRepository {
    executions: DashMap<String, WorkflowExecution>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn find_by_id(
        &self,
        id: &EntityId,
    ) -> Result<Option<WorkflowExecution>, AutomationError> {
        Ok(self.executions.get(id.as_str()).map(|e| e.clone()))
    }

    async fn insert(&self, execution: &WorkflowExecution) -> Result<(), AutomationError> {
        self.executions
            .insert(execution.id.to_string(), execution.clone());
        Ok(())
    }

    async fn update(&self, execution: &WorkflowExecution) -> Result<(), AutomationError> {
        self.executions
            .insert(execution.id.to_string(), execution.clone());
        Ok(())
    }
}

/// In-memory rule store; preserves insertion order for priority ties
#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<Vec<AssignmentRule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rule: AssignmentRule) {
        self.rules.write().unwrap().push(rule);
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn find_active(&self) -> Result<Vec<AssignmentRule>, AutomationError> {
        let rules = self.rules.read().map_err(repo_err)?;
        Ok(rules.iter().filter(|r| r.active).cloned().collect())
    }

    async fn save(&self, rule: &AssignmentRule) -> Result<(), AutomationError> {
        let mut rules = self.rules.write().map_err(repo_err)?;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => rules.push(rule.clone()),
        }
        Ok(())
    }
}

/// In-memory approval request store
#[derive(Default)]
pub struct InMemoryApprovalRepository {
    requests: DashMap<String, ApprovalRequest>,
}

impl InMemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ApprovalRequest> {
        self.requests.iter().map(|r| r.clone()).collect()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn find_by_id(
        &self,
        id: &EntityId,
    ) -> Result<Option<ApprovalRequest>, AutomationError> {
        Ok(self.requests.get(id.as_str()).map(|r| r.clone()))
    }

    async fn insert(&self, request: &ApprovalRequest) -> Result<(), AutomationError> {
        self.requests.insert(request.id.to_string(), request.clone());
        Ok(())
    }

    async fn update(&self, request: &ApprovalRequest) -> Result<(), AutomationError> {
        self.requests.insert(request.id.to_string(), request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lead_repository_save_and_find() {
        let repo = InMemoryLeadRepository::new();
        let lead = Lead::new("Acme Corp");
        repo.insert(lead.clone());

        let found = repo.find_by_id(&lead.id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "Acme Corp");
    }

    #[tokio::test]
    async fn test_update_known_field_and_custom_field() {
        let repo = InMemoryLeadRepository::new();
        let lead = Lead::new("Acme Corp");
        repo.insert(lead.clone());
        let actor = EntityId::new();

        let updated = repo
            .update_field(&lead.id, "status", serde_json::json!("contacted"), &actor)
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::Contacted);

        let updated = repo
            .update_field(&lead.id, "budget_band", serde_json::json!("high"), &actor)
            .await
            .unwrap();
        assert_eq!(
            updated.custom_fields.get("budget_band"),
            Some(&serde_json::json!("high"))
        );
    }

    #[tokio::test]
    async fn test_count_active_excludes_closed_leads() {
        let repo = InMemoryLeadRepository::new();
        let user = EntityId::new();
        let at = Utc::now();

        let mut open = Lead::new("Open");
        open.assigned_to = Some(user.clone());
        open.assigned_at = Some(at);
        repo.insert(open);

        let mut converted = Lead::new("Converted");
        converted.assigned_to = Some(user.clone());
        converted.assigned_at = Some(at);
        converted.status = LeadStatus::Converted;
        repo.insert(converted);

        assert_eq!(repo.count_active_for(&user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_directory_filters() {
        let dir = InMemoryUserDirectory::new();
        let mut manager = UserAccount::new("Dana", "dana@leadflow.dev", UserRole::Manager);
        manager.department = Some("enterprise".into());
        dir.insert(manager);
        let mut rep = UserAccount::new("Sam", "sam@leadflow.dev", UserRole::Sales);
        rep.department = Some("enterprise".into());
        dir.insert(rep);

        assert_eq!(dir.find_by_role(UserRole::Sales).await.unwrap().len(), 1);
        assert_eq!(dir.find_by_department("enterprise").await.unwrap().len(), 2);
        let managers = dir.find_managers_by_department("enterprise").await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].name, "Dana");
    }

    #[tokio::test]
    async fn test_workflow_repository_active_by_event() {
        use crate::domain::workflow::{Action, ActionStep, Trigger, WorkflowDefinition};

        let repo = InMemoryWorkflowRepository::new();
        let mut workflow = WorkflowDefinition::new(
            "Welcome",
            Trigger {
                event: TriggerEvent::LeadCreated,
                conditions: vec![],
            },
            vec![ActionStep::immediate(Action::SendNotification {
                recipient: EntityId::new(),
                message: "hi".into(),
            })],
            EntityId::new(),
        );
        repo.insert(workflow.clone());

        let active = repo
            .find_active_by_event(TriggerEvent::LeadCreated)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        workflow.deactivate();
        repo.save(&workflow).await.unwrap();
        let active = repo
            .find_active_by_event(TriggerEvent::LeadCreated)
            .await
            .unwrap();
        assert!(active.is_empty());
    }
}
