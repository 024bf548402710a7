pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Actor, Application, ApplicationId, AuctionStatus, AuditEntry, BankId, BusinessId,
    InteractionRecord, InteractionStatus, Money, OfferId, RevenueCollection, RevenueKind, TimeMs,
};
pub use error::AppError;
pub use notify::{MockNotifier, NotificationEvent, NotificationSink, NullNotifier, WebhookNotifier};
pub use orchestration::{ExpiryReconciler, InteractionTracker, SweepSummary, TrackerError};
