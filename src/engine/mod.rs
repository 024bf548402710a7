//! Pure rules for the auction lifecycle. No I/O lives here.

pub mod status;
pub mod windows;

pub use status::derive_status;
pub use windows::{auction_window, is_urgent, offer_window, Window};
