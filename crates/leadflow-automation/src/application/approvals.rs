//! Approval decisions
//!
//! Resolves pending approval requests. Expiry is evaluated lazily inside
//! the domain state machine, so a decision arriving after `expires_at`
//! fails validation even if the stored status still reads pending.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::domain::approval::{ApprovalError, ApprovalRequest};
use crate::domain::value_objects::EntityId;
use crate::error::AutomationError;
use crate::ports::inbound::ApprovalUseCases;
use crate::ports::outbound::ApprovalRepository;

pub struct ApprovalService {
    approvals: Arc<dyn ApprovalRepository>,
}

impl ApprovalService {
    pub fn new(approvals: Arc<dyn ApprovalRepository>) -> Self {
        Self { approvals }
    }
}

#[async_trait]
impl ApprovalUseCases for ApprovalService {
    async fn respond_to_approval(
        &self,
        request_id: &EntityId,
        approver: &EntityId,
        approved: bool,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, AutomationError> {
        let mut request = self
            .approvals
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| {
                AutomationError::NotFound(format!("approval request {request_id} not found"))
            })?;

        let result = if approved {
            request.approve(approver.clone(), reason)
        } else {
            request.reject(approver.clone(), reason)
        };
        result.map_err(|e: ApprovalError| AutomationError::Validation(e.to_string()))?;

        self.approvals.update(&request).await?;
        info!(request = %request_id, approver = %approver, approved, "approval resolved");
        Ok(request)
    }
}
