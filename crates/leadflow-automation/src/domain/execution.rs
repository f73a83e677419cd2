//! Workflow executions
//!
//! One run of a workflow against one lead: an audit record mutated
//! incrementally as actions complete, never deleted. Status transitions
//! are monotonic; a failed action does not stop later actions, but any
//! failure makes the run's terminal status `Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::value_objects::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Ordering rank used to enforce monotonic transitions
    fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Completed,
    Failed,
}

/// Per-action outcome, positionally indexed against the definition's actions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl ActionOutcome {
    pub fn pending() -> Self {
        Self {
            status: ActionStatus::Pending,
            result: None,
            error: None,
            executed_at: None,
        }
    }

    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: ActionStatus::Completed,
            result: Some(result),
            error: None,
            executed_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            result: None,
            error: Some(error.into()),
            executed_at: Some(Utc::now()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: EntityId,
    pub workflow_id: EntityId,
    pub lead_id: EntityId,
    pub triggered_by: EntityId,
    pub status: ExecutionStatus,
    pub context: HashMap<String, serde_json::Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub action_outcomes: Vec<ActionOutcome>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowExecution {
    pub fn new(
        workflow_id: EntityId,
        lead_id: EntityId,
        triggered_by: EntityId,
        context: HashMap<String, serde_json::Value>,
        action_count: usize,
    ) -> Self {
        Self {
            id: EntityId::new(),
            workflow_id,
            lead_id,
            triggered_by,
            status: ExecutionStatus::Pending,
            context,
            started_at: None,
            completed_at: None,
            error: None,
            action_outcomes: vec![ActionOutcome::pending(); action_count],
            created_at: Utc::now(),
        }
    }

    /// Transition to `Running`; ignored once past `Pending`
    pub fn start(&mut self) {
        if self.transition(ExecutionStatus::Running) {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn record_outcome(&mut self, index: usize, outcome: ActionOutcome) {
        if let Some(slot) = self.action_outcomes.get_mut(index) {
            *slot = outcome;
        }
    }

    /// Terminal status from recorded outcomes: `Failed` iff any action failed
    pub fn finish(&mut self) {
        let any_failed = self
            .action_outcomes
            .iter()
            .any(|o| o.status == ActionStatus::Failed);
        let target = if any_failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        if self.transition(target) {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Abort the whole run with an engine-level error
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.transition(ExecutionStatus::Failed) {
            self.error = Some(error.into());
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn cancel(&mut self) -> bool {
        let cancelled = self.transition(ExecutionStatus::Cancelled);
        if cancelled {
            self.completed_at = Some(Utc::now());
        }
        cancelled
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Monotonic transition guard: never move backward, terminal is final
    fn transition(&mut self, to: ExecutionStatus) -> bool {
        if self.status.is_terminal() || to == self.status || to.rank() < self.status.rank() {
            return false;
        }
        self.status = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution(action_count: usize) -> WorkflowExecution {
        WorkflowExecution::new(
            EntityId::new(),
            EntityId::new(),
            EntityId::new(),
            HashMap::new(),
            action_count,
        )
    }

    #[test]
    fn test_outcome_list_matches_action_count() {
        let exec = execution(3);
        assert_eq!(exec.action_outcomes.len(), 3);
        assert!(exec
            .action_outcomes
            .iter()
            .all(|o| o.status == ActionStatus::Pending));
    }

    #[test]
    fn test_finish_completed_when_all_succeed() {
        let mut exec = execution(2);
        exec.start();
        exec.record_outcome(0, ActionOutcome::completed(serde_json::json!("ok")));
        exec.record_outcome(1, ActionOutcome::completed(serde_json::json!("ok")));
        exec.finish();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn test_finish_failed_when_any_action_failed() {
        let mut exec = execution(2);
        exec.start();
        exec.record_outcome(0, ActionOutcome::failed("smtp down"));
        exec.record_outcome(1, ActionOutcome::completed(serde_json::json!("ok")));
        exec.finish();
        assert_eq!(exec.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut exec = execution(1);
        exec.start();
        exec.finish();
        let terminal = exec.status;

        // no transitions out of a terminal state
        exec.start();
        assert_eq!(exec.status, terminal);
        assert!(!exec.cancel());
        exec.fail("late error");
        assert_eq!(exec.status, terminal);
        assert!(exec.error.is_none());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut exec = execution(1);
        exec.start();
        assert!(exec.cancel());
        assert_eq!(exec.status, ExecutionStatus::Cancelled);
        exec.finish();
        assert_eq!(exec.status, ExecutionStatus::Cancelled);
    }
}
