//! Routing policies
//!
//! Prioritized, condition-gated assignment rules plus the derived
//! workload figures used for round-robin fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conditions::Condition;
use crate::domain::records::WorkingHours;
use crate::domain::value_objects::EntityId;

/// A routing policy. Lower priority values are evaluated first;
/// ties break by creation order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub id: EntityId,
    pub name: String,
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    pub active: bool,
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub territory: Option<String>,
    pub owner_id: EntityId,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRule {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        conditions: Vec<Condition>,
        actions: Vec<RuleAction>,
        owner_id: EntityId,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            priority,
            conditions,
            actions,
            active: true,
            working_hours: None,
            territory: None,
            owner_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = Some(hours);
        self
    }

    pub fn with_territory(mut self, territory: impl Into<String>) -> Self {
        self.territory = Some(territory.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    AssignToUser { user_id: EntityId },
    AssignToTeam { department: String },
}

/// Derived per-user workload, recomputed per assignment decision
#[derive(Clone, Debug)]
pub struct WorkloadInfo {
    pub user_id: EntityId,
    pub active_leads: u64,
    pub overdue_tasks: u64,
}

impl WorkloadInfo {
    const ACTIVE_LEAD_WEIGHT: f64 = 1.0;
    const OVERDUE_TASK_WEIGHT: f64 = 2.0;

    /// Composite score, lowest wins the round-robin
    pub fn score(&self) -> f64 {
        self.active_leads as f64 * Self::ACTIVE_LEAD_WEIGHT
            + self.overdue_tasks as f64 * Self::OVERDUE_TASK_WEIGHT
    }
}

/// Outcome of an assignment decision
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub lead_id: EntityId,
    pub assigned_to: EntityId,
    pub reason: String,
    pub rule_id: Option<EntityId>,
    pub previous_assignee: Option<EntityId>,
}
