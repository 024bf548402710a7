//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by aggregate:
//! - `applications.rs` - Application rows and terminal-status transitions
//! - `banks.rs` - Bank registry operations
//! - `interactions.rs` - Interaction records and the transactional ingest ops
//! - `revenue.rs` - Revenue collection rows and reporting queries
//! - `audit.rs` - Append-only audit log
//!
//! Every multi-statement invariant (purchase + ledger row, transition +
//! audit entry, selection + accept/reject + commission) executes inside a
//! single transaction here; callers never compose partial writes.

mod applications;
mod audit;
mod banks;
mod interactions;
mod revenue;

use crate::domain::{
    Application, ApplicationId, AuctionStatus, BankId, BusinessId, InteractionRecord,
    InteractionStatus, Money, OfferId, TimeMs,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// A registered bank, the fan-out target set for new applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankRow {
    pub id: BankId,
    pub name: String,
    pub registered_at: TimeMs,
}

/// Result of the transactional purchase operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Lead unlocked; the ledger row (still `pending`) carries this key.
    Purchased { event_key: String },
    /// The bank already holds this lead; nothing was written.
    AlreadyPurchased,
}

/// Result of the transactional offer-submission operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Offer recorded; the application's new offer count is returned.
    Submitted { offer_count: u32 },
    /// No purchased record exists for the pair; nothing was written.
    NoPurchase,
    /// The record already carries an offer; nothing was written.
    AlreadySubmitted,
}

/// Result of the transactional offer-selection operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Offer accepted; losing offers rejected; commission row inserted.
    Selected {
        bank_id: BankId,
        commission: Money,
        rejected_offers: u64,
    },
    /// No record on the application carries this offer id.
    UnknownOffer,
    /// The offer was already accepted or rejected; nothing was written.
    AlreadyResolved,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// =========================================================================
// Row mapping helpers shared by the submodules
// =========================================================================

fn map_application(row: &SqliteRow) -> Application {
    let id: String = row.get("id");
    let status_str: String = row.get("status");
    let status = AuctionStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(application_id = %id, status = %status_str, "Unknown application status in row, treating as ignored");
        AuctionStatus::Ignored
    });
    let metadata_str: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_str).unwrap_or_else(|e| {
        warn!(application_id = %id, error = %e, "Failed to parse application metadata, using empty object");
        serde_json::json!({})
    });
    let offer_count: i64 = row.get("offer_count");

    Application {
        id: ApplicationId::new(id),
        business_id: BusinessId::new(row.get("business_id")),
        metadata,
        submitted_at: TimeMs::new(row.get("submitted_at")),
        auction_ends_at: TimeMs::new(row.get("auction_ends_at")),
        selection_ends_at: TimeMs::new(row.get("selection_ends_at")),
        offer_count: offer_count.max(0) as u32,
        status,
    }
}

fn map_interaction_record(row: &SqliteRow) -> InteractionRecord {
    let application_id: String = row.get("application_id");
    let bank_id: String = row.get("bank_id");
    let status_str: String = row.get("status");
    let status = InteractionStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(
            application_id = %application_id,
            bank_id = %bank_id,
            status = %status_str,
            "Unknown interaction status in row, treating as submitted"
        );
        InteractionStatus::Submitted
    });
    let offer_amount = row
        .get::<Option<String>, _>("offer_amount")
        .map(|s| parse_money(&s, "offer_amount"));

    InteractionRecord {
        application_id: ApplicationId::new(application_id),
        bank_id: BankId::new(bank_id),
        business_id: BusinessId::new(row.get("business_id")),
        submitted_at: TimeMs::new(row.get("submitted_at")),
        window_starts_at: TimeMs::new(row.get("window_starts_at")),
        window_ends_at: TimeMs::new(row.get("window_ends_at")),
        viewed_at: row.get::<Option<i64>, _>("viewed_at").map(TimeMs::new),
        purchased_at: row.get::<Option<i64>, _>("purchased_at").map(TimeMs::new),
        offer_window_starts_at: row
            .get::<Option<i64>, _>("offer_window_starts_at")
            .map(TimeMs::new),
        offer_window_ends_at: row
            .get::<Option<i64>, _>("offer_window_ends_at")
            .map(TimeMs::new),
        offer_id: row.get::<Option<String>, _>("offer_id").map(OfferId::new),
        offer_amount,
        offer_sent_at: row.get::<Option<i64>, _>("offer_sent_at").map(TimeMs::new),
        offer_accepted_at: row
            .get::<Option<i64>, _>("offer_accepted_at")
            .map(TimeMs::new),
        offer_rejected_at: row
            .get::<Option<i64>, _>("offer_rejected_at")
            .map(TimeMs::new),
        status,
    }
}

fn parse_money(s: &str, field: &str) -> Money {
    Money::from_str(s).unwrap_or_else(|e| {
        warn!(field = field, value = %s, error = %e, "Failed to parse money decimal, using zero");
        Money::zero()
    })
}
