//! SLA computation
//!
//! Time-remaining and escalation status for an assigned lead, derived
//! fresh on every call against a fixed-duration deadline. Nothing here
//! is cached or stored incrementally.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::EntityId;

/// SLA windows and escalation policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlaConfig {
    /// Deadline, in hours from assignment
    pub duration_hours: i64,
    /// Hours-elapsed thresholds; the escalation level is the number crossed
    pub escalation_thresholds_hours: Vec<i64>,
    pub missing_manager_policy: MissingManagerPolicy,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            duration_hours: 24,
            escalation_thresholds_hours: vec![24, 48, 72],
            missing_manager_policy: MissingManagerPolicy::Skip,
        }
    }
}

impl SlaConfig {
    pub fn duration(&self) -> Duration {
        Duration::hours(self.duration_hours)
    }
}

/// What to do when an overdue lead's assignee has no manager
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingManagerPolicy {
    /// Best-effort: the lead is skipped this sweep
    Skip,
    /// Route the escalation to admin-role users instead
    EscalateToAdmins,
}

/// Derived SLA position of one assigned lead
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlaStatus {
    pub lead_id: EntityId,
    pub assigned_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Clamped to zero for display
    pub hours_remaining: f64,
    pub is_overdue: bool,
    pub hours_overdue: f64,
    /// 0 = none, 1..N = highest crossed threshold
    pub escalation_level: usize,
}

impl SlaStatus {
    pub fn compute(
        lead_id: EntityId,
        assigned_at: DateTime<Utc>,
        now: DateTime<Utc>,
        config: &SlaConfig,
    ) -> Self {
        let deadline = assigned_at + config.duration();
        let remaining_hours = signed_hours(deadline - now);
        let elapsed_hours = signed_hours(now - assigned_at);

        let escalation_level = config
            .escalation_thresholds_hours
            .iter()
            .filter(|threshold| elapsed_hours >= **threshold as f64)
            .count();

        Self {
            lead_id,
            assigned_at,
            deadline,
            hours_remaining: remaining_hours.max(0.0),
            is_overdue: remaining_hours < 0.0,
            hours_overdue: (-remaining_hours).max(0.0),
            escalation_level,
        }
    }
}

fn signed_hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}
