//! Append-only audit trail of application status transitions.

use crate::domain::{Actor, ApplicationId, AuctionStatus, TimeMs};
use serde::{Deserialize, Serialize};

/// One status transition, as recorded. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub application_id: ApplicationId,
    pub from_status: AuctionStatus,
    pub to_status: AuctionStatus,
    /// `system` for automated transitions, `admin:<id>` for manual ones.
    pub actor: String,
    pub reason: String,
    pub recorded_at: TimeMs,
}

impl AuditEntry {
    pub fn new(
        application_id: ApplicationId,
        from_status: AuctionStatus,
        to_status: AuctionStatus,
        actor: &Actor,
        reason: impl Into<String>,
        recorded_at: TimeMs,
    ) -> Self {
        AuditEntry {
            application_id,
            from_status,
            to_status,
            actor: actor.as_audit_str(),
            reason: reason.into(),
            recorded_at,
        }
    }
}
