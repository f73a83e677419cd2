//! Routing & Assignment Engine
//!
//! Picks an owner for a lead: explicit assignee first, then the first
//! satisfied assignment rule by ascending priority, then workload-balanced
//! round-robin among active sales users.
//!
//! Assignment is a read-then-write sequence without a transaction;
//! concurrent requests for the same lead race last-writer-wins, which is
//! acceptable for human-supervised workflows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::conditions::evaluate;
use crate::domain::records::{Lead, UserAccount, UserRole, WorkingHours};
use crate::domain::routing::{AssignmentResult, AssignmentRule, RuleAction, WorkloadInfo};
use crate::domain::value_objects::EntityId;
use crate::error::AutomationError;
use crate::ports::inbound::RoutingUseCases;
use crate::ports::outbound::{
    ActivityEntry, ActivityKind, ActivityLog, LeadRepository, RuleRepository, TaskService,
    UserDirectory,
};

#[derive(Clone)]
pub struct RoutingEngine {
    leads: Arc<dyn LeadRepository>,
    users: Arc<dyn UserDirectory>,
    tasks: Arc<dyn TaskService>,
    rules: Arc<dyn RuleRepository>,
    activities: Arc<dyn ActivityLog>,
}

impl RoutingEngine {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        users: Arc<dyn UserDirectory>,
        tasks: Arc<dyn TaskService>,
        rules: Arc<dyn RuleRepository>,
        activities: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            leads,
            users,
            tasks,
            rules,
            activities,
        }
    }

    /// Assignment with an overriding reason for the explicit-assignee path,
    /// used by the workflow `assign_lead` action.
    pub(crate) async fn assign_with_reason(
        &self,
        lead_id: &EntityId,
        explicit_assignee: Option<&EntityId>,
        explicit_reason: Option<&str>,
    ) -> Result<AssignmentResult, AutomationError> {
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("lead {lead_id} not found")))?;

        if let Some(user_id) = explicit_assignee {
            let user = self.active_user(user_id).await?;
            let reason = explicit_reason.unwrap_or("Manual assignment");
            return self.finalize(&lead, &user.id, reason, None).await;
        }

        let now = Utc::now();
        if let Some((rule, user)) = self.match_rules(&lead, now).await? {
            let reason = format!("Assignment rule '{}'", rule.name);
            return self.finalize(&lead, &user.id, &reason, Some(rule.id.clone())).await;
        }

        let user = self.round_robin().await?;
        self.finalize(&lead, &user.id, "Round-robin assignment", None)
            .await
    }

    async fn active_user(&self, user_id: &EntityId) -> Result<UserAccount, AutomationError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| {
                AutomationError::Validation(format!("user {user_id} is not an active user"))
            })?;
        Ok(user)
    }

    /// First rule, in ascending priority order (ties by creation order),
    /// whose conditions match and whose action yields an available user.
    async fn match_rules(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<(AssignmentRule, UserAccount)>, AutomationError> {
        let mut rules = self.rules.find_active().await?;
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let subject = lead.as_subject();
        let context = HashMap::new();

        for rule in rules {
            if let Some(territory) = &rule.territory {
                if lead.territory.as_deref() != Some(territory.as_str()) {
                    continue;
                }
            }
            if !evaluate(&rule.conditions, &subject, &context) {
                continue;
            }
            if let Some(user) = self.resolve_rule_assignee(&rule, now).await? {
                return Ok(Some((rule, user)));
            }
            debug!(rule = %rule.name, "assignment rule matched but no target available");
        }
        Ok(None)
    }

    async fn resolve_rule_assignee(
        &self,
        rule: &AssignmentRule,
        now: DateTime<Utc>,
    ) -> Result<Option<UserAccount>, AutomationError> {
        for action in &rule.actions {
            match action {
                RuleAction::AssignToUser { user_id } => {
                    if let Some(user) = self.users.find_by_id(user_id).await? {
                        if user.active && within_hours(&user, rule.working_hours, now) {
                            return Ok(Some(user));
                        }
                    }
                }
                RuleAction::AssignToTeam { department } => {
                    let team = self.users.find_by_department(department).await?;
                    if let Some(user) = team
                        .into_iter()
                        .find(|u| u.active && within_hours(u, rule.working_hours, now))
                    {
                        return Ok(Some(user));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Lowest workload score wins; ties keep the earliest user in the
    /// directory's iteration order, so selection is repeatable.
    async fn round_robin(&self) -> Result<UserAccount, AutomationError> {
        let sales: Vec<UserAccount> = self
            .users
            .find_by_role(UserRole::Sales)
            .await?
            .into_iter()
            .filter(|u| u.active)
            .collect();

        let mut best: Option<(UserAccount, f64)> = None;
        for user in sales {
            let workload = WorkloadInfo {
                user_id: user.id.clone(),
                active_leads: self.leads.count_active_for(&user.id).await?,
                overdue_tasks: self.tasks.count_overdue_for(&user.id).await?,
            };
            let score = workload.score();
            match &best {
                Some((_, lowest)) if score >= *lowest => {}
                _ => best = Some((user, score)),
            }
        }

        match best {
            Some((user, _)) => Ok(user),
            None => Err(AutomationError::BusinessLogic(
                "no active sales users available".into(),
            )),
        }
    }

    async fn finalize(
        &self,
        lead: &Lead,
        user_id: &EntityId,
        reason: &str,
        rule_id: Option<EntityId>,
    ) -> Result<AssignmentResult, AutomationError> {
        let previous = lead.assigned_to.clone();
        let now = Utc::now();
        self.leads.assign(&lead.id, user_id, now).await?;

        let kind = if previous.is_some() {
            ActivityKind::Reassigned
        } else {
            ActivityKind::Assigned
        };
        self.activities
            .record(ActivityEntry {
                lead_id: lead.id.clone(),
                actor_id: None,
                kind,
                message: format!("Lead assigned to {user_id}: {reason}"),
                at: now,
            })
            .await?;

        info!(lead = %lead.id, assignee = %user_id, reason, "lead assigned");

        Ok(AssignmentResult {
            lead_id: lead.id.clone(),
            assigned_to: user_id.clone(),
            reason: reason.to_string(),
            rule_id,
            previous_assignee: previous,
        })
    }
}

fn within_hours(user: &UserAccount, rule_hours: Option<WorkingHours>, now: DateTime<Utc>) -> bool {
    match rule_hours.or(user.working_hours) {
        Some(hours) => hours.contains(now),
        None => true,
    }
}

#[async_trait]
impl RoutingUseCases for RoutingEngine {
    async fn assign_lead(
        &self,
        lead_id: &EntityId,
        explicit_assignee: Option<&EntityId>,
    ) -> Result<AssignmentResult, AutomationError> {
        self.assign_with_reason(lead_id, explicit_assignee, None)
            .await
    }

    async fn reassign_lead(
        &self,
        lead_id: &EntityId,
        new_assignee: &EntityId,
        acting_user: &EntityId,
        reason: &str,
    ) -> Result<AssignmentResult, AutomationError> {
        let actor = self
            .users
            .find_by_id(acting_user)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("user {acting_user} not found")))?;
        if !actor.role.can_reassign() {
            return Err(AutomationError::Validation(
                "only admins and managers may reassign leads".into(),
            ));
        }

        let target = self.active_user(new_assignee).await?;
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("lead {lead_id} not found")))?;

        let previous = lead.assigned_to.clone();
        let now = Utc::now();
        self.leads.assign(&lead.id, &target.id, now).await?;

        let reason = format!("Manual reassignment: {reason}");
        self.activities
            .record(ActivityEntry {
                lead_id: lead.id.clone(),
                actor_id: Some(actor.id.clone()),
                kind: ActivityKind::Reassigned,
                message: match &previous {
                    Some(prev) => format!("Lead moved from {prev} to {}: {reason}", target.id),
                    None => format!("Lead assigned to {}: {reason}", target.id),
                },
                at: now,
            })
            .await?;

        info!(lead = %lead.id, assignee = %target.id, actor = %actor.id, "lead reassigned");

        Ok(AssignmentResult {
            lead_id: lead.id.clone(),
            assigned_to: target.id,
            reason,
            rule_id: None,
            previous_assignee: previous,
        })
    }
}
