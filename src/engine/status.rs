//! The status-derivation rule.
//!
//! This is the only implementation of the rule. The ingest path, the expiry
//! reconciler, and read-time projections all call `derive_status`; nothing
//! else may re-derive an application's status.

use crate::domain::{AuctionStatus, TimeMs};

/// Map (now, auction end, offer count) to the canonical auction status.
///
/// - No auction end recorded: return `fallback` (legacy/incomplete rows).
/// - Before the auction end the application is live regardless of offers,
///   since offers may still be arriving during the window.
/// - At or after the auction end: `Completed` with offers, `Ignored` without.
pub fn derive_status(
    now: TimeMs,
    auction_ends_at: Option<TimeMs>,
    offer_count: u32,
    fallback: AuctionStatus,
) -> AuctionStatus {
    let Some(ends_at) = auction_ends_at else {
        return fallback;
    };

    if now < ends_at {
        AuctionStatus::LiveAuction
    } else if offer_count > 0 {
        AuctionStatus::Completed
    } else {
        AuctionStatus::Ignored
    }
}
