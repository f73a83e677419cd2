//! LeadFlow Automation Core
//!
//! Event-driven automation for a sales-lead management platform.
//!
//! ## Architecture
//!
//! - **Domain Layer**: condition evaluation, workflow/execution records,
//!   routing policies, SLA arithmetic, approval state machine
//! - **Ports Layer**: hexagonal architecture interfaces
//! - **Application Layer**: the engines, wired by constructor injection
//! - **Infrastructure Layer**: in-memory adapters for testing
//!
//! ## Key Components
//!
//! - **Workflow Engine**: matches definitions against business events and
//!   runs ordered, delayable, partially-failable action lists on spawned
//!   tasks, including a human-approval gate
//! - **Routing & Assignment Engine**: prioritized rule matching with
//!   workload-balanced round-robin fallback
//! - **SLA & Escalation Tracker**: deadline tracking with multi-level
//!   escalation over the same assignment data

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

// Re-exports for convenience
pub use application::{
    ActionExecutor, ApprovalService, EngineConfig, RoutingEngine, SlaTracker, WorkflowEngine,
    WorkflowTriggers,
};
pub use domain::approval::{ApprovalRequest, ApprovalStatus};
pub use domain::conditions::{evaluate, Condition, ConditionOperator, LogicalOperator};
pub use domain::execution::{ActionOutcome, ActionStatus, ExecutionStatus, WorkflowExecution};
pub use domain::records::{Lead, LeadStatus, UserAccount, UserRole, WorkingHours};
pub use domain::routing::{AssignmentResult, AssignmentRule, RuleAction, WorkloadInfo};
pub use domain::sla::{MissingManagerPolicy, SlaConfig, SlaStatus};
pub use domain::value_objects::EntityId;
pub use domain::workflow::{Action, ActionStep, Trigger, TriggerEvent, WorkflowDefinition};
pub use error::{AutomationError, Result};
pub use ports::inbound::{ApprovalUseCases, RoutingUseCases, SlaUseCases, WorkflowUseCases};
