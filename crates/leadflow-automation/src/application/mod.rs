//! Application layer
//!
//! Engine services wired together by constructor injection. Each service
//! takes its collaborators as `Arc<dyn Trait>` so tests substitute the
//! in-memory infrastructure adapters.

pub mod actions;
pub mod approvals;
pub mod routing_engine;
pub mod sla_tracker;
pub mod triggers;
pub mod workflow_engine;

pub use actions::ActionExecutor;
pub use approvals::ApprovalService;
pub use routing_engine::RoutingEngine;
pub use sla_tracker::SlaTracker;
pub use triggers::WorkflowTriggers;
pub use workflow_engine::WorkflowEngine;

use crate::domain::sla::SlaConfig;

/// Tunable engine defaults
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub sla: SlaConfig,
    /// Approval requests expire this many hours after creation
    pub approval_expires_hours: i64,
    /// Task due date when the action declares none
    pub task_due_offset_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sla: SlaConfig::default(),
            approval_expires_hours: 24,
            task_due_offset_hours: 24,
        }
    }
}
