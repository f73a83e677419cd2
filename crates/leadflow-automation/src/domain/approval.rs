//! Approval requests
//!
//! A human-gated workflow step. The request is time-boxed: once
//! `expires_at` passes without a decision the logical status is
//! `Expired` even before any store update, so expiry is evaluated
//! lazily at read time. Terminal states are final. Expiry never
//! affects the originating execution's own status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::records::UserRole;
use crate::domain::value_objects::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub lead_id: EntityId,
    pub requested_by: EntityId,
    pub approver_role: UserRole,
    pub approver: Option<EntityId>,
    pub status: ApprovalStatus,
    pub request_data: HashMap<String, serde_json::Value>,
    pub response_reason: Option<String>,
    pub responded_by: Option<EntityId>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        execution_id: EntityId,
        lead_id: EntityId,
        requested_by: EntityId,
        approver_role: UserRole,
        approver: Option<EntityId>,
        request_data: HashMap<String, serde_json::Value>,
        expires_in_hours: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            execution_id,
            lead_id,
            requested_by,
            approver_role,
            approver,
            status: ApprovalStatus::Pending,
            request_data,
            response_reason: None,
            responded_by: None,
            responded_at: None,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
        }
    }

    /// Stored status folded with lazy expiry
    pub fn effective_status(&self, now: DateTime<Utc>) -> ApprovalStatus {
        if self.status == ApprovalStatus::Pending && now > self.expires_at {
            ApprovalStatus::Expired
        } else {
            self.status
        }
    }

    pub fn approve(
        &mut self,
        approver: EntityId,
        reason: Option<String>,
    ) -> Result<(), ApprovalError> {
        self.respond(ApprovalStatus::Approved, approver, reason)
    }

    pub fn reject(
        &mut self,
        approver: EntityId,
        reason: Option<String>,
    ) -> Result<(), ApprovalError> {
        self.respond(ApprovalStatus::Rejected, approver, reason)
    }

    fn respond(
        &mut self,
        decision: ApprovalStatus,
        approver: EntityId,
        reason: Option<String>,
    ) -> Result<(), ApprovalError> {
        let now = Utc::now();
        match self.effective_status(now) {
            ApprovalStatus::Pending => {
                self.status = decision;
                self.responded_by = Some(approver);
                self.response_reason = reason;
                self.responded_at = Some(now);
                Ok(())
            }
            ApprovalStatus::Expired => Err(ApprovalError::Expired),
            _ => Err(ApprovalError::AlreadyResolved),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("approval request has expired")]
    Expired,
    #[error("approval request is already resolved")]
    AlreadyResolved,
}
