//! Notification seam for external collaborators (web layer, email service).
//!
//! Delivery is best-effort and fire-and-forget: the ingest path and the
//! reconciler publish after their transactions commit, never inside them,
//! and a failed delivery is logged and dropped.

use crate::domain::{ApplicationId, AuctionStatus, BankId, BusinessId, OfferId, TimeMs};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub mod mock;
pub mod webhook;

pub use mock::MockNotifier;
pub use webhook::WebhookNotifier;

/// Core events surfaced to out-of-scope collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A new lead entered its auction window.
    LeadAvailable {
        application_id: ApplicationId,
        business_id: BusinessId,
        auction_ends_at: TimeMs,
    },
    /// A bank unlocked a lead.
    LeadPurchased {
        application_id: ApplicationId,
        bank_id: BankId,
    },
    /// A bank submitted financing terms.
    OfferSubmitted {
        application_id: ApplicationId,
        bank_id: BankId,
        offer_id: OfferId,
    },
    /// The business accepted an offer.
    OfferSelected {
        application_id: ApplicationId,
        bank_id: BankId,
        offer_id: OfferId,
    },
    /// The reconciler closed an auction.
    AuctionExpired {
        application_id: ApplicationId,
        status: AuctionStatus,
    },
}

/// Sink for core events.
///
/// Implementations must not assume delivery is retried by the caller; any
/// retrying happens inside `publish`.
#[async_trait]
pub trait NotificationSink: Send + Sync + fmt::Debug {
    async fn publish(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Error type for notification delivery.
#[derive(Debug, Clone)]
pub enum NotifyError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Other error
    Other(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            NotifyError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            NotifyError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Sink for deployments without a webhook target: log and drop.
#[derive(Debug, Default, Clone)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn publish(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        tracing::debug!(?event, "Dropping notification (no sink configured)");
        Ok(())
    }
}
