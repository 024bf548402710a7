//! Application (lead) aggregate and its auction status.

use crate::domain::{ApplicationId, BusinessId, TimeMs};
use serde::{Deserialize, Serialize};

/// Canonical auction lifecycle status of an application.
///
/// The persisted column is a reconciler-maintained cache; consumers that
/// need real-time accuracy recompute via `engine::status::derive_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Auction window open: banks may inspect and purchase the lead.
    LiveAuction,
    /// Auction closed with at least one offer submitted.
    Completed,
    /// Auction closed without any offer.
    Ignored,
}

impl AuctionStatus {
    /// Stable string form persisted in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::LiveAuction => "live_auction",
            AuctionStatus::Completed => "completed",
            AuctionStatus::Ignored => "ignored",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live_auction" => Some(AuctionStatus::LiveAuction),
            "completed" => Some(AuctionStatus::Completed),
            "ignored" => Some(AuctionStatus::Ignored),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuctionStatus::LiveAuction)
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A submitted lead eligible for bank purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub business_id: BusinessId,
    /// Free-form lead metadata captured at submission (amount requested,
    /// merchant details). Opaque to the state machine.
    pub metadata: serde_json::Value,
    pub submitted_at: TimeMs,
    /// End of the purchase window (submitted_at + auction window).
    pub auction_ends_at: TimeMs,
    /// End of the offer/selection window (auction_ends_at + offer window).
    pub selection_ends_at: TimeMs,
    /// Monotonically increasing count of distinct offers.
    pub offer_count: u32,
    /// Reconciler-maintained status cache.
    pub status: AuctionStatus,
}

impl Application {
    /// Build a freshly submitted application with computed windows.
    pub fn submit(
        business_id: BusinessId,
        metadata: serde_json::Value,
        submitted_at: TimeMs,
        auction_window_ms: i64,
        offer_window_ms: i64,
    ) -> Self {
        let auction = crate::engine::windows::auction_window(submitted_at, auction_window_ms);
        let offers = crate::engine::windows::offer_window(auction.ends_at, offer_window_ms);
        let auction_ends_at = auction.ends_at;
        let selection_ends_at = offers.ends_at;
        Application {
            id: ApplicationId::generate(),
            business_id,
            metadata,
            submitted_at,
            auction_ends_at,
            selection_ends_at,
            offer_count: 0,
            status: AuctionStatus::LiveAuction,
        }
    }
}
