//! Per (application, bank) interaction record: the full timeline of one
//! bank's engagement with one lead.

use crate::domain::{ApplicationId, BankId, BusinessId, Money, OfferId, TimeMs};
use serde::{Deserialize, Serialize};

/// Per-record status of a bank's interaction with an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    /// Record created at application fan-out; the bank has not looked yet.
    Submitted,
    /// The bank viewed the lead during the auction window.
    Available,
    /// The bank purchased the lead.
    Purchased,
    /// Auction closed; offer window open, terms not yet sent.
    OfferReceived,
    /// The bank submitted financing terms.
    OfferSent,
    /// The business accepted this bank's offer.
    Accepted,
    /// The business accepted a different bank's offer.
    Rejected,
    /// Application window elapsed without a purchase.
    Abandoned,
    /// Offer window elapsed without acceptance or rejection.
    DealExpired,
}

impl InteractionStatus {
    /// Stable string form persisted in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionStatus::Submitted => "submitted",
            InteractionStatus::Available => "available",
            InteractionStatus::Purchased => "purchased",
            InteractionStatus::OfferReceived => "offer_received",
            InteractionStatus::OfferSent => "offer_sent",
            InteractionStatus::Accepted => "accepted",
            InteractionStatus::Rejected => "rejected",
            InteractionStatus::Abandoned => "abandoned",
            InteractionStatus::DealExpired => "deal_expired",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(InteractionStatus::Submitted),
            "available" => Some(InteractionStatus::Available),
            "purchased" => Some(InteractionStatus::Purchased),
            "offer_received" => Some(InteractionStatus::OfferReceived),
            "offer_sent" => Some(InteractionStatus::OfferSent),
            "accepted" => Some(InteractionStatus::Accepted),
            "rejected" => Some(InteractionStatus::Rejected),
            "abandoned" => Some(InteractionStatus::Abandoned),
            "deal_expired" => Some(InteractionStatus::DealExpired),
            _ => None,
        }
    }

    /// Terminal record states; window-expiry re-application is a no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InteractionStatus::Accepted
                | InteractionStatus::Rejected
                | InteractionStatus::Abandoned
                | InteractionStatus::DealExpired
        )
    }
}

impl std::fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (application, bank) interaction timeline row.
///
/// Invariants enforced by the repository:
/// - at most one record per (application, bank) pair;
/// - `purchased_at` is set at most once;
/// - `offer_accepted_at` and `offer_rejected_at` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub application_id: ApplicationId,
    pub bank_id: BankId,
    /// Denormalized lead owner.
    pub business_id: BusinessId,
    pub submitted_at: TimeMs,
    /// Application (purchase) window.
    pub window_starts_at: TimeMs,
    pub window_ends_at: TimeMs,
    pub viewed_at: Option<TimeMs>,
    pub purchased_at: Option<TimeMs>,
    /// Offer window; set on purchase.
    pub offer_window_starts_at: Option<TimeMs>,
    pub offer_window_ends_at: Option<TimeMs>,
    pub offer_id: Option<OfferId>,
    /// Financing amount the bank offered; commission base.
    pub offer_amount: Option<Money>,
    pub offer_sent_at: Option<TimeMs>,
    pub offer_accepted_at: Option<TimeMs>,
    pub offer_rejected_at: Option<TimeMs>,
    pub status: InteractionStatus,
}

impl InteractionRecord {
    /// A fresh fan-out record for one registered bank.
    pub fn fanned_out(
        application_id: ApplicationId,
        bank_id: BankId,
        business_id: BusinessId,
        submitted_at: TimeMs,
        window_ends_at: TimeMs,
    ) -> Self {
        InteractionRecord {
            application_id,
            bank_id,
            business_id,
            submitted_at,
            window_starts_at: submitted_at,
            window_ends_at,
            viewed_at: None,
            purchased_at: None,
            offer_window_starts_at: None,
            offer_window_ends_at: None,
            offer_id: None,
            offer_amount: None,
            offer_sent_at: None,
            offer_accepted_at: None,
            offer_rejected_at: None,
            status: InteractionStatus::Submitted,
        }
    }

    /// True once the bank holds this lead.
    pub fn is_purchased(&self) -> bool {
        self.purchased_at.is_some()
    }

    /// True once an offer outcome (accept/reject) is recorded.
    pub fn offer_resolved(&self) -> bool {
        self.offer_accepted_at.is_some() || self.offer_rejected_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            InteractionStatus::Submitted,
            InteractionStatus::Available,
            InteractionStatus::Purchased,
            InteractionStatus::OfferReceived,
            InteractionStatus::OfferSent,
            InteractionStatus::Accepted,
            InteractionStatus::Rejected,
            InteractionStatus::Abandoned,
            InteractionStatus::DealExpired,
        ] {
            assert_eq!(InteractionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InteractionStatus::parse("nope"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(InteractionStatus::Accepted.is_terminal());
        assert!(InteractionStatus::Rejected.is_terminal());
        assert!(InteractionStatus::Abandoned.is_terminal());
        assert!(InteractionStatus::DealExpired.is_terminal());
        assert!(!InteractionStatus::Purchased.is_terminal());
        assert!(!InteractionStatus::OfferSent.is_terminal());
    }

    #[test]
    fn test_fanned_out_record_defaults() {
        let record = InteractionRecord::fanned_out(
            ApplicationId::new("app-1".to_string()),
            BankId::new("bank-1".to_string()),
            BusinessId::new("biz-1".to_string()),
            TimeMs::new(1_000),
            TimeMs::new(2_000),
        );
        assert_eq!(record.status, InteractionStatus::Submitted);
        assert_eq!(record.window_starts_at, TimeMs::new(1_000));
        assert!(!record.is_purchased());
        assert!(!record.offer_resolved());
    }
}
