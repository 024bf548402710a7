//! Revenue ledger events: flat lead-purchase fees and deal commissions.

use crate::domain::{ApplicationId, BankId, Money, TimeMs};
use serde::{Deserialize, Serialize};

/// What a collection row charges for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueKind {
    /// Flat fee for unlocking a lead.
    LeadPurchase,
    /// Commission on an accepted offer's financing amount.
    Commission,
}

impl RevenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueKind::LeadPurchase => "lead_purchase",
            RevenueKind::Commission => "commission",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lead_purchase" => Some(RevenueKind::LeadPurchase),
            "commission" => Some(RevenueKind::Commission),
            _ => None,
        }
    }
}

impl std::fmt::Display for RevenueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collection lifecycle of a revenue row. Only this field is ever updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Collected,
    Failed,
    Refunded,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Collected => "collected",
            CollectionStatus::Failed => "failed",
            CollectionStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CollectionStatus::Pending),
            "collected" => Some(CollectionStatus::Collected),
            "failed" => Some(CollectionStatus::Failed),
            "refunded" => Some(CollectionStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One monetary event tied to an (application, bank) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueCollection {
    /// Deterministic unique key; makes inserts idempotent under retry.
    pub event_key: String,
    pub application_id: ApplicationId,
    pub bank_id: BankId,
    pub amount: Money,
    pub kind: RevenueKind,
    pub status: CollectionStatus,
    pub recorded_at: TimeMs,
}

impl RevenueCollection {
    /// A pending collection row; the event key is derived from the kind and
    /// the (application, bank) pair, so one purchase or one accepted offer
    /// maps to exactly one row.
    pub fn pending(
        kind: RevenueKind,
        application_id: ApplicationId,
        bank_id: BankId,
        amount: Money,
        recorded_at: TimeMs,
    ) -> Self {
        let event_key = Self::compute_event_key(kind, &application_id, &bank_id);
        RevenueCollection {
            event_key,
            application_id,
            bank_id,
            amount,
            kind,
            status: CollectionStatus::Pending,
            recorded_at,
        }
    }

    /// Compute a stable unique key for a revenue event.
    ///
    /// SHA-256 over length-prefixed fields, truncated to 128 bits. The
    /// birthday bound gives ~2^64 collision resistance, far beyond the
    /// row counts this ledger sees.
    pub fn compute_event_key(
        kind: RevenueKind,
        application_id: &ApplicationId,
        bank_id: &BankId,
    ) -> String {
        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, kind.as_str());
        hash_var(&mut hasher, application_id.as_str());
        hash_var(&mut hasher, bank_id.as_str());

        let hash = hasher.finalize();
        format!("rev:{}", hex::encode(&hash[..16]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ids() -> (ApplicationId, BankId) {
        (
            ApplicationId::new("app-1".to_string()),
            BankId::new("bank-1".to_string()),
        )
    }

    #[test]
    fn test_event_key_is_deterministic() {
        let (app, bank) = ids();
        let k1 = RevenueCollection::compute_event_key(RevenueKind::LeadPurchase, &app, &bank);
        let k2 = RevenueCollection::compute_event_key(RevenueKind::LeadPurchase, &app, &bank);
        assert_eq!(k1, k2);
        assert!(k1.starts_with("rev:"));
    }

    #[test]
    fn test_event_key_varies_by_kind_and_pair() {
        let (app, bank) = ids();
        let purchase = RevenueCollection::compute_event_key(RevenueKind::LeadPurchase, &app, &bank);
        let commission = RevenueCollection::compute_event_key(RevenueKind::Commission, &app, &bank);
        assert_ne!(purchase, commission);

        let other_bank = BankId::new("bank-2".to_string());
        let other = RevenueCollection::compute_event_key(RevenueKind::LeadPurchase, &app, &other_bank);
        assert_ne!(purchase, other);
    }

    #[test]
    fn test_pending_row_shape() {
        let (app, bank) = ids();
        let row = RevenueCollection::pending(
            RevenueKind::LeadPurchase,
            app,
            bank,
            Money::from_str("250").unwrap(),
            TimeMs::new(1_000),
        );
        assert_eq!(row.status, CollectionStatus::Pending);
        assert_eq!(row.kind, RevenueKind::LeadPurchase);
        assert!(row.amount.is_positive());
    }

    #[test]
    fn test_kind_and_status_round_trip() {
        assert_eq!(RevenueKind::parse("lead_purchase"), Some(RevenueKind::LeadPurchase));
        assert_eq!(RevenueKind::parse("commission"), Some(RevenueKind::Commission));
        assert_eq!(RevenueKind::parse("x"), None);
        assert_eq!(CollectionStatus::parse("pending"), Some(CollectionStatus::Pending));
        assert_eq!(CollectionStatus::parse("refunded"), Some(CollectionStatus::Refunded));
        assert_eq!(CollectionStatus::parse("x"), None);
    }
}
