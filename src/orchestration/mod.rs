//! Stateful services over the repository: the Interaction Tracker (ingest
//! path) and the Expiry Reconciler (periodic sweep).

pub mod reconciler;
pub mod tracker;

pub use reconciler::{ExpiryReconciler, SweepSummary};
pub use tracker::{InteractionTracker, TrackerError};
