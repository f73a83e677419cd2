//! SLA & Escalation Tracker
//!
//! Computes time-remaining status for assigned leads and escalates
//! overdue ones to the assignee's managers. Runs on a periodic sweep
//! driven by the surrounding application; every figure is recomputed
//! fresh per call.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::records::{Lead, UserAccount, UserRole};
use crate::domain::sla::{MissingManagerPolicy, SlaConfig, SlaStatus};
use crate::domain::value_objects::EntityId;
use crate::error::AutomationError;
use crate::ports::inbound::SlaUseCases;
use crate::ports::outbound::{
    ActivityEntry, ActivityKind, ActivityLog, LeadRepository, Notification, NotificationService,
    UserDirectory,
};

pub struct SlaTracker {
    leads: Arc<dyn LeadRepository>,
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationService>,
    activities: Arc<dyn ActivityLog>,
    config: SlaConfig,
}

impl SlaTracker {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        users: Arc<dyn UserDirectory>,
        notifications: Arc<dyn NotificationService>,
        activities: Arc<dyn ActivityLog>,
        config: SlaConfig,
    ) -> Self {
        Self {
            leads,
            users,
            notifications,
            activities,
            config,
        }
    }

    fn status_for(&self, lead: &Lead) -> Result<SlaStatus, AutomationError> {
        let assigned_at = lead.assigned_at.ok_or_else(|| {
            AutomationError::BusinessLogic(format!("lead {} has not been assigned", lead.id))
        })?;
        Ok(SlaStatus::compute(
            lead.id.clone(),
            assigned_at,
            Utc::now(),
            &self.config,
        ))
    }

    async fn overdue_with_leads(&self) -> Result<Vec<(Lead, SlaStatus)>, AutomationError> {
        let cutoff = Utc::now() - self.config.duration();
        let candidates = self.leads.find_assigned_before(cutoff).await?;

        let mut overdue = Vec::new();
        for lead in candidates {
            let Some(assigned_at) = lead.assigned_at else {
                continue;
            };
            let status = SlaStatus::compute(lead.id.clone(), assigned_at, Utc::now(), &self.config);
            if status.is_overdue {
                overdue.push((lead, status));
            }
        }
        Ok(overdue)
    }

    /// Escalation recipients: the assignee's same-department managers, or
    /// admins when the configured policy says so and none exist.
    async fn escalation_recipients(
        &self,
        assignee: &UserAccount,
    ) -> Result<Vec<UserAccount>, AutomationError> {
        let managers = match &assignee.department {
            Some(department) => self
                .users
                .find_managers_by_department(department)
                .await?
                .into_iter()
                .filter(|u| u.active)
                .collect(),
            None => Vec::new(),
        };

        if !managers.is_empty() {
            return Ok(managers);
        }

        match self.config.missing_manager_policy {
            MissingManagerPolicy::Skip => Ok(Vec::new()),
            MissingManagerPolicy::EscalateToAdmins => Ok(self
                .users
                .find_by_role(UserRole::Admin)
                .await?
                .into_iter()
                .filter(|u| u.active)
                .collect()),
        }
    }
}

#[async_trait]
impl SlaUseCases for SlaTracker {
    async fn check_sla_compliance(&self, lead_id: &EntityId) -> Result<SlaStatus, AutomationError> {
        let lead = self
            .leads
            .find_by_id(lead_id)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("lead {lead_id} not found")))?;
        self.status_for(&lead)
    }

    async fn overdue_leads(&self) -> Result<Vec<SlaStatus>, AutomationError> {
        Ok(self
            .overdue_with_leads()
            .await?
            .into_iter()
            .map(|(_, status)| status)
            .collect())
    }

    async fn escalate_overdue_leads(&self) -> Result<u64, AutomationError> {
        let mut escalated = 0;

        for (lead, status) in self.overdue_with_leads().await? {
            let Some(assignee_id) = &lead.assigned_to else {
                warn!(lead = %lead.id, "overdue lead has a timestamp but no assignee");
                continue;
            };
            let Some(assignee) = self.users.find_by_id(assignee_id).await? else {
                warn!(lead = %lead.id, assignee = %assignee_id, "assignee missing from directory");
                continue;
            };

            let recipients = self.escalation_recipients(&assignee).await?;
            if recipients.is_empty() {
                debug!(lead = %lead.id, assignee = %assignee.id, "no escalation recipient, skipped");
                continue;
            }

            let message = format!(
                "Lead '{}' escalated to level {} ({:.1}h overdue)",
                lead.name, status.escalation_level, status.hours_overdue
            );
            for recipient in &recipients {
                self.notifications
                    .send(Notification {
                        recipient_id: recipient.id.clone(),
                        message: message.clone(),
                        kind: "sla_escalation".into(),
                        related_entity_type: "lead".into(),
                        related_entity_id: lead.id.clone(),
                    })
                    .await?;
            }
            self.activities
                .record(ActivityEntry {
                    lead_id: lead.id.clone(),
                    actor_id: None,
                    kind: ActivityKind::Escalated,
                    message,
                    at: Utc::now(),
                })
                .await?;

            escalated += 1;
        }

        info!(escalated, "SLA escalation sweep finished");
        Ok(escalated)
    }
}
