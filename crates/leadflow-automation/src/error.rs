//! Error taxonomy for the automation core.
//!
//! Three caller-facing categories plus a storage category:
//! - `Validation`: malformed input or insufficient permission, caller-correctable
//! - `NotFound`: referenced workflow/lead/user absent
//! - `BusinessLogic`: valid input but no legal outcome exists
//! - `Repository`: storage/collaborator failure

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AutomationError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business logic error: {0}")]
    BusinessLogic(String),

    #[error("repository error: {0}")]
    Repository(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;
