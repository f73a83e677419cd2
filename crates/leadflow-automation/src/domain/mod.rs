//! Domain layer
//!
//! Pure types and logic: condition evaluation, workflow and execution
//! records, routing policies, SLA arithmetic and the approval state
//! machine. Nothing in this layer performs I/O.

pub mod approval;
pub mod conditions;
pub mod execution;
pub mod records;
pub mod routing;
pub mod sla;
pub mod value_objects;
pub mod workflow;
