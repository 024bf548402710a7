//! Auction and offer window arithmetic.
//!
//! Canonical durations: 48h auction window, 24h offer/selection window after
//! auction end. Deployments may override both through configuration; the
//! selection deadline is always the offer-window end.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

/// Canonical auction (purchase) window: 48 hours.
pub const AUCTION_WINDOW_MS: i64 = 48 * 60 * 60 * 1000;

/// Canonical offer/selection window after auction end: 24 hours.
pub const OFFER_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Deadlines within this margin are flagged urgent in read projections: 1 hour.
pub const URGENCY_MARGIN_MS: i64 = 60 * 60 * 1000;

/// A half-open-at-the-start, closed-at-the-end time window `[start, end]`.
/// The end instant itself counts as elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub starts_at: TimeMs,
    pub ends_at: TimeMs,
}

impl Window {
    pub fn new(starts_at: TimeMs, ends_at: TimeMs) -> Self {
        Window { starts_at, ends_at }
    }

    /// True while events inside the window are still accepted.
    pub fn is_open(&self, now: TimeMs) -> bool {
        now >= self.starts_at && now < self.ends_at
    }

    /// True once the window has closed.
    pub fn has_elapsed(&self, now: TimeMs) -> bool {
        now >= self.ends_at
    }
}

/// The purchase window opened by an application submission.
pub fn auction_window(submitted_at: TimeMs, auction_window_ms: i64) -> Window {
    Window::new(submitted_at, submitted_at.plus_ms(auction_window_ms))
}

/// The offer window opened by a purchase: starts when the auction closes.
pub fn offer_window(auction_ends_at: TimeMs, offer_window_ms: i64) -> Window {
    Window::new(auction_ends_at, auction_ends_at.plus_ms(offer_window_ms))
}

/// Urgency flag for read projections: within one hour of `deadline` and not
/// yet past it.
pub fn is_urgent(now: TimeMs, deadline: TimeMs) -> bool {
    now < deadline && deadline.as_ms() - now.as_ms() <= URGENCY_MARGIN_MS
}
